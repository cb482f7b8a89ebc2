//! Natural-Language Translator
//!
//! Turns free text into robot commands by asking an LLM backend. The output
//! is validated strictly against the command vocabulary:
//!
//! ```text
//! turn left | turn right | position | center | forward <n> | backward <n>
//! ```
//!
//! Anything else the model produces is dropped. The translator never talks to
//! the grid server itself; callers run the commands through
//! [`crate::client::GridClient`].
//!
//! # Usage
//!
//! ```ignore
//! use gridbot_core::translator::{OpenAiBackend, Translator};
//!
//! let translator = Translator::new(OpenAiBackend::from_env()?, "gpt-4o-mini");
//! let commands = translator.translate("go up three", "(7, 7), Facing: Up").await?;
//! ```

mod backend;
mod openai;

pub use backend::{LlmBackend, LlmRequest, LlmResponse};
pub use openai::{OpenAiBackend, DEFAULT_API_BASE, DEFAULT_MODEL};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Upper bound on model output; a command list is short
pub const MAX_RESPONSE_TOKENS: u32 = 150;

/// The command vocabulary as shown to users and the model
pub const VOCABULARY: [&str; 6] = [
    "forward <steps>",
    "backward <steps>",
    "turn left",
    "turn right",
    "position",
    "center",
];

/// Default system prompt; `{current_position}` is replaced before each request
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a robot control assistant that translates natural language into robot commands.

The robot lives on a 15x15 grid (x and y from 0 to 14) that wraps around at the edges.
Facing Up decreases y, Right increases x, Down increases y, Left decreases x.
The robot is currently at {current_position}.

AVAILABLE COMMANDS (exactly as written):
- forward <number>
- backward <number>
- turn left
- turn right
- position
- center

Respond with a JSON object of the form {"commands": ["forward 3", "turn right"]}.
Use only the commands above, one per array entry, with no explanations.
If you are not sure what to do, respond with {"commands": ["position"]}."#;

/// A validated command from the translator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranslatedCommand {
    /// `turn left`
    TurnLeft,
    /// `turn right`
    TurnRight,
    /// `position` (asks the server with `GET_POSITION`)
    Position,
    /// `center`
    Center,
    /// `forward <n>`
    Forward(u32),
    /// `backward <n>`
    Backward(u32),
}

impl TranslatedCommand {
    /// Validate one entry; `None` for anything outside the vocabulary
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let lowered = entry.trim().to_ascii_lowercase();
        let parts: Vec<&str> = lowered.split_whitespace().collect();
        match parts.as_slice() {
            ["turn", "left"] => Some(Self::TurnLeft),
            ["turn", "right"] => Some(Self::TurnRight),
            ["position"] => Some(Self::Position),
            ["center"] => Some(Self::Center),
            ["forward", n] => parse_count(n).map(Self::Forward),
            ["backward", n] => parse_count(n).map(Self::Backward),
            _ => None,
        }
    }

    /// Protocol line sent to the server
    #[must_use]
    pub fn wire_line(&self) -> String {
        match self {
            Self::TurnLeft => "TURN LEFT".to_string(),
            Self::TurnRight => "TURN RIGHT".to_string(),
            Self::Position => "GET_POSITION".to_string(),
            Self::Center => "CENTER".to_string(),
            Self::Forward(n) => format!("FORWARD {n}"),
            Self::Backward(n) => format!("BACKWARD {n}"),
        }
    }
}

impl std::fmt::Display for TranslatedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TurnLeft => f.write_str("turn left"),
            Self::TurnRight => f.write_str("turn right"),
            Self::Position => f.write_str("position"),
            Self::Center => f.write_str("center"),
            Self::Forward(n) => write!(f, "forward {n}"),
            Self::Backward(n) => write!(f, "backward {n}"),
        }
    }
}

fn parse_count(text: &str) -> Option<u32> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// Translation failure
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The backend request failed
    #[error("{backend} request failed: {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error chain, formatted
        message: String,
    },

    /// The model answered with JSON that lacks a usable `commands` list
    #[error("malformed model response: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct CommandList {
    commands: Vec<serde_json::Value>,
}

/// Pull validated commands out of a model response
///
/// Accepts a JSON object with a `commands` array, or a plain block with one
/// command per line. Non-string and invalid entries are dropped.
///
/// # Errors
///
/// Returns [`TranslateError::Malformed`] when the text looks like JSON but has
/// no `commands` array.
pub fn extract_commands(content: &str) -> Result<Vec<TranslatedCommand>, TranslateError> {
    let content = strip_code_fence(content.trim());

    let entries: Vec<String> = if content.starts_with('{') {
        let list: CommandList = serde_json::from_str(content)
            .map_err(|e| TranslateError::Malformed(e.to_string()))?;
        list.commands
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    } else {
        content.lines().map(str::to_string).collect()
    };

    Ok(entries
        .iter()
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let parsed = TranslatedCommand::parse(entry);
            if parsed.is_none() {
                debug!(entry = entry.as_str(), "Dropping invalid command");
            }
            parsed
        })
        .collect())
}

// Models sometimes wrap JSON in ```json fences despite instructions
fn strip_code_fence(content: &str) -> &str {
    content
        .strip_prefix("```json")
        .or_else(|| content.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map_or(content, str::trim)
}

/// Free text → validated commands
pub struct Translator<B: LlmBackend> {
    backend: B,
    model: String,
    system_prompt: String,
}

impl<B: LlmBackend> Translator<B> {
    /// Translator using `backend` and `model` with the default prompt
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the system prompt template
    #[must_use]
    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    /// Backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// System prompt with `{current_position}` filled in
    #[must_use]
    pub fn render_prompt(&self, current_position: &str) -> String {
        self.system_prompt
            .replace("{current_position}", current_position)
    }

    /// Translate `input`; an empty result means nothing valid was produced
    ///
    /// # Errors
    ///
    /// Backend failures and malformed JSON responses.
    pub async fn translate(
        &self,
        input: &str,
        current_position: &str,
    ) -> Result<Vec<TranslatedCommand>, TranslateError> {
        let request = LlmRequest::new(input, self.model.clone())
            .with_system(self.render_prompt(current_position))
            .with_temperature(0.1)
            .with_max_tokens(MAX_RESPONSE_TOKENS)
            .with_json_response(true);

        let response =
            self.backend
                .complete(&request)
                .await
                .map_err(|e| TranslateError::Backend {
                    backend: self.backend.name().to_string(),
                    message: format!("{e:#}"),
                })?;
        debug!(content = response.content.as_str(), tokens = ?response.tokens_used, "Model response");

        extract_commands(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct ScriptedBackend {
        reply: anyhow::Result<String>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedBackend {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
            self.seen.lock().push(request.clone());
            match &self.reply {
                Ok(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: request.model.clone(),
                    tokens_used: None,
                }),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!(
            TranslatedCommand::parse("turn left"),
            Some(TranslatedCommand::TurnLeft)
        );
        assert_eq!(
            TranslatedCommand::parse("  Forward 3 "),
            Some(TranslatedCommand::Forward(3))
        );
        assert_eq!(
            TranslatedCommand::parse("backward 12"),
            Some(TranslatedCommand::Backward(12))
        );
        assert_eq!(
            TranslatedCommand::parse("position"),
            Some(TranslatedCommand::Position)
        );
        assert_eq!(TranslatedCommand::parse("forward -1"), None);
        assert_eq!(TranslatedCommand::parse("forward three"), None);
        assert_eq!(TranslatedCommand::parse("jump"), None);
        assert_eq!(TranslatedCommand::parse("turn around"), None);
    }

    #[test]
    fn test_wire_lines() {
        assert_eq!(TranslatedCommand::Position.wire_line(), "GET_POSITION");
        assert_eq!(TranslatedCommand::Forward(4).wire_line(), "FORWARD 4");
        assert_eq!(TranslatedCommand::TurnRight.wire_line(), "TURN RIGHT");
        assert_eq!(TranslatedCommand::Backward(2).to_string(), "backward 2");
    }

    #[test]
    fn test_extract_json() {
        let commands =
            extract_commands(r#"{"commands": ["forward 3", "fly away", 7, "turn right"]}"#)
                .unwrap();
        assert_eq!(
            commands,
            vec![TranslatedCommand::Forward(3), TranslatedCommand::TurnRight]
        );
    }

    #[test]
    fn test_extract_fenced_json() {
        let commands = extract_commands("```json\n{\"commands\": [\"center\"]}\n```").unwrap();
        assert_eq!(commands, vec![TranslatedCommand::Center]);
    }

    #[test]
    fn test_extract_line_block() {
        let commands = extract_commands("forward 2\n\nSure! Here you go\nturn left\n").unwrap();
        assert_eq!(
            commands,
            vec![TranslatedCommand::Forward(2), TranslatedCommand::TurnLeft]
        );
    }

    #[test]
    fn test_extract_malformed_json() {
        assert!(matches!(
            extract_commands(r#"{"steps": ["forward 1"]}"#),
            Err(TranslateError::Malformed(_))
        ));
        assert!(matches!(
            extract_commands("{not json"),
            Err(TranslateError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_translate_fills_prompt() {
        let translator = Translator::new(
            ScriptedBackend::ok(r#"{"commands":["backward 1","position"]}"#),
            "test-model",
        );
        let commands = translator.translate("back up", "(7, 7), Facing: Up").await.unwrap();
        assert_eq!(
            commands,
            vec![TranslatedCommand::Backward(1), TranslatedCommand::Position]
        );

        let seen = translator.backend().seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test-model");
        assert!(seen[0].json_response);
        assert_eq!(seen[0].max_tokens, MAX_RESPONSE_TOKENS);
        let system = seen[0].system.as_deref().unwrap();
        assert!(system.contains("currently at (7, 7), Facing: Up"));
        assert!(!system.contains("{current_position}"));
    }

    #[tokio::test]
    async fn test_translate_backend_failure() {
        let backend = ScriptedBackend {
            reply: Err(anyhow::anyhow!("rate limited")),
            seen: Mutex::new(Vec::new()),
        };
        let err = Translator::new(backend, "m")
            .translate("hi", "(0, 0)")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Scripted request failed: rate limited");
    }
}
