//! Wire Protocol
//!
//! Plain ASCII text over TCP, one request per LF-terminated line and one reply
//! line per request.
//!
//! ```text
//! client                      server
//!   GET_DIMENSIONS      ──▶     15 15
//!   GET_POSITION        ──▶     7 7 0
//!   TURN RIGHT          ──▶     OK
//!   FORWARD 3           ──▶     OK
//!   FORWARD three       ──▶     ERROR invalid step count: three
//! ```

use tracing::warn;

use crate::command::parse_line;
use crate::grid::RobotGrid;
use crate::robot::{Heading, RobotSnapshot};

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:12345";

/// How rejected lines are answered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyMode {
    /// `ERROR <reason>` for malformed or unknown lines
    #[default]
    Strict,
    /// `OK` for every non-blank line
    Lenient,
}

/// One reply line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// `"<W> <H>"`
    Dimensions {
        /// Grid width
        width: u32,
        /// Grid height
        height: u32,
    },
    /// `"<x> <y> <heading>"`
    Position(RobotSnapshot),
    /// `"OK"`
    Ok,
    /// `"ERROR <reason>"`
    Error(String),
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dimensions { width, height } => write!(f, "{width} {height}"),
            Self::Position(snapshot) => f.write_str(&snapshot.wire()),
            Self::Ok => f.write_str("OK"),
            Self::Error(reason) => write!(f, "ERROR {reason}"),
        }
    }
}

impl Reply {
    /// Reply line including the trailing newline
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }

    /// Whether this is an `ERROR` reply
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Parse a `"<x> <y> <heading>"` reply
#[must_use]
pub fn parse_position(line: &str) -> Option<RobotSnapshot> {
    let mut parts = line.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let heading = Heading::from_degrees(parts.next()?.parse().ok()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(RobotSnapshot { x, y, heading })
}

/// Parse a `"<W> <H>"` reply
#[must_use]
pub fn parse_dimensions(line: &str) -> Option<(u32, u32)> {
    let mut parts = line.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((width, height))
}

/// Handle one request line against the grid
///
/// Blank lines produce no reply. Rejected lines are logged and nothing is
/// queued for them; the reply depends on `mode`.
pub fn respond(grid: &RobotGrid, line: &str, mode: ReplyMode) -> Option<Reply> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match parse_line(line) {
        Ok(command) => Some(grid.execute(command)),
        Err(e) => {
            warn!(line, error = %e, "Rejected command");
            Some(match mode {
                ReplyMode::Strict => Reply::Error(e.to_string()),
                ReplyMode::Lenient => Reply::Ok,
            })
        }
    }
}
