//! Gridbot Chat - Natural-language controller for the grid robot
//!
//! Reads instructions from stdin, asks an OpenAI-compatible model to turn
//! them into robot commands and sends those to a running `gridbot-daemon`.
//!
//! # Usage
//!
//! ```bash
//! # Against a local daemon, key from the environment
//! OPENAI_API_KEY=sk-... gridbot-chat
//!
//! # Local model server
//! gridbot-chat --api-base http://localhost:11434/v1 --model llama3.2
//! ```

mod session;

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use gridbot_core::translator::{DEFAULT_API_BASE, DEFAULT_MODEL};
use gridbot_core::{GridClient, OpenAiBackend, Translator, DEFAULT_BIND_ADDR};

use session::{Input, Session};

/// Gridbot Chat - drive the robot in plain language
#[derive(Parser, Debug)]
#[command(name = "gridbot-chat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address of the grid server
    #[arg(short = 'a', long, env = "GRIDBOT_ADDR", default_value = DEFAULT_BIND_ADDR)]
    addr: SocketAddr,

    /// Model name
    #[arg(short = 'm', long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// System prompt template file; `{current_position}` is filled in per request
    #[arg(short = 's', long, env = "GRIDBOT_SYSTEM_PROMPT", value_name = "FILE")]
    system_prompt: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "GRIDBOT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// Initialize logging with the specified level; logs go to stderr
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("gridbot_chat={level},gridbot_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a system prompt template
fn load_system_prompt(path: &Path) -> Result<String> {
    let template = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read system prompt: {}", path.display()))?;
    if template.trim().is_empty() {
        anyhow::bail!("System prompt {} is empty", path.display());
    }
    if !template.contains("{current_position}") {
        warn!(path = %path.display(), "System prompt has no {{current_position}} placeholder");
    }
    Ok(template)
}

fn prompt() -> Result<()> {
    print!("\n> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let api_key = args.api_key.filter(|k| !k.is_empty());
    if api_key.is_none() {
        eprintln!("Warning: OPENAI_API_KEY is not set; only `direct:` commands will work");
    }
    let backend = OpenAiBackend::new(args.api_base, api_key)?;
    info!(api_base = backend.api_base(), model = %args.model, "Using model backend");

    let client = GridClient::new(args.addr);
    client.probe().await.with_context(|| {
        format!(
            "Could not connect to the grid server at {}. Start gridbot-daemon first.",
            args.addr
        )
    })?;

    let mut translator = Translator::new(backend, args.model);
    if let Some(ref path) = args.system_prompt {
        translator = translator.with_system_prompt(load_system_prompt(path)?);
        info!(path = %path.display(), "Loaded system prompt");
    }

    let session = Session::new(client, translator);
    if !session.model_available().await {
        eprintln!("Warning: the model backend did not answer its health check");
    }

    println!("Gridbot chat, connected to {}", args.addr);
    println!("Initial robot status: {}", session.position_description().await);
    println!("Type 'help' for direct commands, 'exit' or 'quit' to leave.");
    println!("Try: 'Where is the robot?', 'Move forward 3 steps and turn right'");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let input = Input::classify(&line);
        if input == Input::Exit {
            break;
        }
        for out in session.handle(&input).await {
            println!("{out}");
        }
        prompt()?;
    }

    println!("Session ended. Goodbye!");
    Ok(())
}
