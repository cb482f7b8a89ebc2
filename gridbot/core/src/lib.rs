//! Gridbot Core - Robot-on-a-grid simulation behind a line protocol
//!
//! A single robot lives on a 15×15 toroidal grid. Clients connect over TCP
//! and send newline-terminated commands; motion commands are queued and
//! applied one unit step per scheduler tick, queries answer immediately.
//!
//! # Architecture
//!
//! ```text
//!  TCP clients ──► ProtocolServer ──► protocol::respond ──► RobotGrid
//!                                                           │   ▲
//!                                        enqueue / wake     │   │ tick()
//!                                                           ▼   │
//!                                                        Scheduler
//!                                                           │
//!                                  StateNotifier (watch) ◄──┘
//!                                          │
//!                                          ▼
//!                                   views / observers
//! ```
//!
//! # Key Types
//!
//! - [`RobotGrid`]: Robot state, pending queue and drain phase behind one lock
//! - [`Scheduler`]: Applies one queued action per tick while work is pending
//! - [`ProtocolServer`]: Accept loop and per-connection line handling
//! - [`StateNotifier`]: Publishes each new robot state to observers
//! - [`GridClient`]: One-shot client for the protocol
//! - [`Translator`]: Natural language → validated commands via an LLM backend
//!
//! # Module Overview
//!
//! - [`robot`]: Headings, wrapping motion and snapshots
//! - [`command`]: Protocol line parsing
//! - [`queue`]: Run-length queue of pending unit actions
//! - [`grid`]: The shared robot core
//! - [`notifier`]: State-change broadcasting
//! - [`scheduler`]: Tick-driven drain of the queue
//! - [`protocol`]: Replies and their wire format
//! - [`server`]: TCP server
//! - [`client`]: TCP client
//! - [`config`]: TOML configuration with environment overrides
//! - [`translator`]: LLM-backed command translation

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod command;
pub mod config;
pub mod grid;
pub mod notifier;
pub mod protocol;
pub mod queue;
pub mod robot;
pub mod scheduler;
pub mod server;
pub mod translator;

// Re-exports for convenience
pub use client::{ClientError, GridClient};
pub use command::{parse_line, Command, CommandError, PendingAction, TurnDirection};
pub use config::{ConfigError, GridConfig};
pub use grid::{DrainPhase, RobotGrid, TickOutcome};
pub use notifier::{StateNotifier, StateSubscriber};
pub use protocol::{respond, Reply, ReplyMode, DEFAULT_BIND_ADDR};
pub use queue::CommandQueue;
pub use robot::{Heading, RobotSnapshot, RobotState, GRID_HEIGHT, GRID_WIDTH};
pub use scheduler::{Scheduler, DEFAULT_TICK_INTERVAL};
pub use server::{ConnectionId, ProtocolServer, ServerError, ServerOptions};
pub use translator::{LlmBackend, OpenAiBackend, TranslateError, TranslatedCommand, Translator};
