//! Gridbot Daemon - Grid robot protocol server
//!
//! Runs the robot grid, its tick scheduler and the TCP line protocol server
//! in one process.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (127.0.0.1:12345, 500 ms ticks)
//! gridbot-daemon
//!
//! # Custom address and faster ticks
//! gridbot-daemon --bind 0.0.0.0:9000 --tick-ms 100
//!
//! # With config file
//! gridbot-daemon --config /etc/gridbot/gridbot.toml
//!
//! # Follow the robot in the terminal
//! gridbot-daemon --view --grid
//!
//! # Verbose logging
//! RUST_LOG=debug gridbot-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

mod view;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use gridbot_core::{GridConfig, ProtocolServer, RobotGrid, Scheduler, ServerOptions};

/// Gridbot Daemon - serves the grid robot over a line protocol
#[derive(Parser, Debug)]
#[command(name = "gridbot-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Listen address (host:port)
    #[arg(short = 'b', long, value_name = "ADDR")]
    bind: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "GRIDBOT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Milliseconds between applied actions
    #[arg(short = 't', long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Answer malformed lines with OK instead of ERROR
    #[arg(long)]
    lenient: bool,

    /// Log every robot state change
    #[arg(long)]
    view: bool,

    /// Also draw the grid (implies --view)
    #[arg(long)]
    grid: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "GRIDBOT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("gridbot_daemon={level},gridbot_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// File, then environment, then command line
fn load_config(args: &Args) -> Result<GridConfig> {
    let config = GridConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(args, config)
}

/// Apply command-line flags on top of `config` and re-validate
fn apply_overrides(args: &Args, mut config: GridConfig) -> Result<GridConfig> {
    if let Some(ref bind) = args.bind {
        config.server.bind_addr = bind.clone();
    }
    if let Some(tick_ms) = args.tick_ms {
        config.robot.tick_interval_ms = tick_ms;
    }
    if args.lenient {
        config.protocol.strict_replies = false;
    }

    config.validate().context("Invalid command-line override")?;
    Ok(config)
}

/// Resolves with the name of the first termination signal received
#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    Ok("Ctrl-C")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), pid = std::process::id(), "Gridbot daemon starting");

    let config = load_config(&args)?;
    let addr = config.bind_addr()?;
    info!(
        %addr,
        tick_ms = config.robot.tick_interval_ms,
        read_timeout_ms = config.server.read_timeout_ms,
        reply_mode = ?config.reply_mode(),
        "Configuration loaded"
    );

    let grid = RobotGrid::shared();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = ProtocolServer::bind(addr, Arc::clone(&grid), ServerOptions::from(&config))
        .await
        .with_context(|| format!("Failed to start server on {addr}"))?;

    let scheduler =
        Scheduler::new(Arc::clone(&grid), config.tick_interval()).spawn(shutdown_rx.clone());

    let view = (args.view || args.grid).then(|| {
        tokio::spawn(view::run(grid.subscribe(), args.grid, shutdown_rx.clone()))
    });

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => info!(signal = name, "Received signal, initiating shutdown"),
            Err(e) => error!(error = %e, "Signal handling failed, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    let result = server.run(shutdown_rx).await;

    info!("Shutting down...");
    if let Err(e) = scheduler.await {
        error!(error = %e, "Scheduler task failed");
    }
    if let Some(view) = view {
        if let Err(e) = view.await {
            error!(error = %e, "View task failed");
        }
    }

    match result {
        Ok(()) => {
            info!(pending = grid.pending(), "Gridbot daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "gridbot-daemon",
            "--bind",
            "127.0.0.1:4000",
            "--tick-ms",
            "50",
            "--lenient",
        ]);
        let config = apply_overrides(&args, GridConfig::default()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:4000");
        assert_eq!(config.robot.tick_interval_ms, 50);
        assert!(!config.protocol.strict_replies);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut base = GridConfig::default();
        base.robot.tick_interval_ms = 250;
        let args = Args::parse_from(["gridbot-daemon"]);
        assert_eq!(apply_overrides(&args, base.clone()).unwrap(), base);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = Args::parse_from(["gridbot-daemon", "--tick-ms", "0"]);
        assert!(apply_overrides(&args, GridConfig::default()).is_err());

        let args = Args::parse_from(["gridbot-daemon", "--bind", "not-an-address"]);
        assert!(apply_overrides(&args, GridConfig::default()).is_err());
    }

    #[test]
    fn test_grid_flag_parses() {
        let args = Args::parse_from(["gridbot-daemon", "--grid"]);
        assert!(args.grid);
        assert!(!args.view);
    }
}
