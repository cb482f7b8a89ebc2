//! Command Parsing
//!
//! Turns one line of protocol text into a [`Command`]. Keywords are matched
//! case-insensitively and surrounding whitespace is ignored.
//!
//! | Line | Command |
//! |------|---------|
//! | `GET_DIMENSIONS` | [`Command::GetDimensions`] |
//! | `GET_POSITION` | [`Command::GetPosition`] |
//! | `CENTER` | [`Command::Center`] |
//! | `TURN LEFT` / `TURN RIGHT` | [`Command::Turn`] |
//! | `FORWARD <n>` / `BACKWARD <n>` | [`Command::Forward`] / [`Command::Backward`] |
//!
//! Motion commands expand into unit [`PendingAction`]s that the scheduler
//! applies one per tick.

use thiserror::Error;

/// A primitive unit action held in the command queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PendingAction {
    /// Rotate 90° counter-clockwise
    TurnLeft,
    /// Rotate 90° clockwise
    TurnRight,
    /// Move one cell along the heading
    StepForward,
    /// Move one cell against the heading
    StepBackward,
}

impl PendingAction {
    /// Short name used in logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TurnLeft => "turn_left",
            Self::TurnRight => "turn_right",
            Self::StepForward => "step_forward",
            Self::StepBackward => "step_backward",
        }
    }
}

impl std::fmt::Display for PendingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction for a `TURN` command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnDirection {
    /// Counter-clockwise
    Left,
    /// Clockwise
    Right,
}

/// A parsed protocol request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Reply with the grid size
    GetDimensions,
    /// Reply with position and heading
    GetPosition,
    /// Reset to the centre cell (applied immediately)
    Center,
    /// Queue one turn
    Turn(TurnDirection),
    /// Queue `n` forward steps
    Forward(u32),
    /// Queue `n` backward steps
    Backward(u32),
}

impl Command {
    /// Unit actions this command contributes to the queue, as `(action, count)`
    ///
    /// Queries and `CENTER` contribute nothing.
    #[must_use]
    pub fn queued_actions(&self) -> Option<(PendingAction, u32)> {
        match *self {
            Self::Turn(TurnDirection::Left) => Some((PendingAction::TurnLeft, 1)),
            Self::Turn(TurnDirection::Right) => Some((PendingAction::TurnRight, 1)),
            Self::Forward(n) => Some((PendingAction::StepForward, n)),
            Self::Backward(n) => Some((PendingAction::StepBackward, n)),
            Self::GetDimensions | Self::GetPosition | Self::Center => None,
        }
    }
}

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Line was blank after trimming
    #[error("empty command")]
    Empty,

    /// First word is not a known keyword
    #[error("unknown command: {0}")]
    Unknown(String),

    /// `TURN`, `FORWARD` or `BACKWARD` without its argument
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),

    /// Extra words after a complete command
    #[error("too many arguments for {0}")]
    TooManyArguments(&'static str),

    /// `TURN` argument other than LEFT/RIGHT
    #[error("invalid turn direction: {0}")]
    InvalidDirection(String),

    /// Step count that is not a non-negative integer fitting in `u32`
    #[error("invalid step count: {0}")]
    InvalidSteps(String),
}

/// Parse one line of protocol text
///
/// # Errors
///
/// Returns a [`CommandError`] describing the first problem found.
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(keyword) = parts.next() else {
        return Err(CommandError::Empty);
    };
    let arg = parts.next();
    let extra = parts.next().is_some();

    match keyword.to_ascii_uppercase().as_str() {
        "GET_DIMENSIONS" => no_args("GET_DIMENSIONS", arg, Command::GetDimensions),
        "GET_POSITION" => no_args("GET_POSITION", arg, Command::GetPosition),
        "CENTER" => no_args("CENTER", arg, Command::Center),
        "TURN" => {
            let arg = one_arg("TURN", arg, extra)?;
            match arg.to_ascii_uppercase().as_str() {
                "LEFT" => Ok(Command::Turn(TurnDirection::Left)),
                "RIGHT" => Ok(Command::Turn(TurnDirection::Right)),
                _ => Err(CommandError::InvalidDirection(arg.to_string())),
            }
        }
        "FORWARD" => parse_steps(one_arg("FORWARD", arg, extra)?).map(Command::Forward),
        "BACKWARD" => parse_steps(one_arg("BACKWARD", arg, extra)?).map(Command::Backward),
        _ => Err(CommandError::Unknown(keyword.to_string())),
    }
}

fn no_args(
    keyword: &'static str,
    arg: Option<&str>,
    command: Command,
) -> Result<Command, CommandError> {
    match arg {
        None => Ok(command),
        Some(_) => Err(CommandError::TooManyArguments(keyword)),
    }
}

fn one_arg<'a>(
    keyword: &'static str,
    arg: Option<&'a str>,
    extra: bool,
) -> Result<&'a str, CommandError> {
    match (arg, extra) {
        (None, _) => Err(CommandError::MissingArgument(keyword)),
        (Some(_), true) => Err(CommandError::TooManyArguments(keyword)),
        (Some(arg), false) => Ok(arg),
    }
}

fn parse_steps(arg: &str) -> Result<u32, CommandError> {
    // u32::from_str accepts a leading '+', reject anything but digits
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidSteps(arg.to_string()));
    }
    arg.parse()
        .map_err(|_| CommandError::InvalidSteps(arg.to_string()))
}
