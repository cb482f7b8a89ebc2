//! Chat session
//!
//! One line of user input in, a list of output lines back. Keeping the
//! printing in `main` lets the session run against fakes in tests.

use gridbot_core::translator::VOCABULARY;
use gridbot_core::{GridClient, LlmBackend, TranslatedCommand, Translator};
use tracing::{debug, warn};

/// What a line of user input asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Blank line
    Empty,
    /// `exit` or `quit`
    Exit,
    /// `help`
    Help,
    /// `direct: <command>`, bypassing the model
    Direct(String),
    /// Anything else, sent to the translator
    Natural(String),
}

impl Input {
    /// Classify a raw line
    pub fn classify(line: &str) -> Self {
        let line = line.trim();
        let lowered = line.to_ascii_lowercase();
        if line.is_empty() {
            Self::Empty
        } else if lowered == "exit" || lowered == "quit" {
            Self::Exit
        } else if lowered == "help" {
            Self::Help
        } else if lowered.starts_with("direct:") {
            Self::Direct(line.get("direct:".len()..).unwrap_or_default().trim().to_string())
        } else {
            Self::Natural(line.to_string())
        }
    }
}

/// Help text listing the direct commands
pub fn help_lines() -> Vec<String> {
    let mut lines = vec!["Available direct commands:".to_string()];
    lines.extend(VOCABULARY.iter().map(|cmd| format!("- {cmd}")));
    lines.push("Use them as `direct: <command>`, e.g. `direct: forward 3`.".to_string());
    lines
}

/// A connected chat session
pub struct Session<B: LlmBackend> {
    client: GridClient,
    translator: Translator<B>,
}

impl<B: LlmBackend> Session<B> {
    /// Session sending commands through `client`
    pub fn new(client: GridClient, translator: Translator<B>) -> Self {
        Self { client, translator }
    }

    /// Whether the model backend answers its health check
    pub async fn model_available(&self) -> bool {
        self.translator.backend().health_check().await
    }

    /// Human-readable position, or the reason it is unavailable
    pub async fn position_description(&self) -> String {
        match self.client.position().await {
            Ok(snapshot) => snapshot.describe(),
            Err(e) => format!("Could not get position: {e}"),
        }
    }

    /// Handle one non-control line and return the lines to print
    pub async fn handle(&self, input: &Input) -> Vec<String> {
        match input {
            Input::Empty | Input::Exit => Vec::new(),
            Input::Help => help_lines(),
            Input::Direct(text) => match TranslatedCommand::parse(text) {
                Some(command) => vec![self.run(command).await],
                None => vec![format!(
                    "Unknown command '{text}'. Type 'help' for the list."
                )],
            },
            Input::Natural(text) => self.translate_and_run(text).await,
        }
    }

    async fn translate_and_run(&self, text: &str) -> Vec<String> {
        let position = self.position_description().await;
        let mut out = Vec::new();
        let mut commands = match self.translator.translate(text, &position).await {
            Ok(commands) => commands,
            Err(e) => {
                warn!(input = text, error = %e, "Translation failed");
                out.push(format!("Could not translate request ({e})"));
                Vec::new()
            }
        };

        if commands.is_empty() {
            if out.is_empty() {
                warn!(input = text, "No valid commands in model response");
                out.push("No valid command understood".to_string());
            }
            out.push("Showing position instead".to_string());
            commands.push(TranslatedCommand::Position);
        }
        debug!(count = commands.len(), "Executing translated commands");

        for command in commands {
            out.push(self.run(command).await);
        }
        out
    }

    async fn run(&self, command: TranslatedCommand) -> String {
        match self.client.execute(&command).await {
            Ok(result) => format!("{command} → {result}"),
            Err(e) => format!("{command} → error: {e}"),
        }
    }
}
