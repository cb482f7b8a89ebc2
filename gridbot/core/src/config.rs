//! Configuration
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`$XDG_CONFIG_HOME/gridbot/gridbot.toml` or an explicit path)
//! 3. Environment variables (`GRIDBOT_*`)
//!
//! The daemon applies CLI flags on top of the result.
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:12345"
//! read_timeout_ms = 500
//! max_line_length = 1024
//! max_connections = 64
//!
//! [robot]
//! tick_interval_ms = 500
//!
//! [protocol]
//! strict_replies = true
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{ReplyMode, DEFAULT_BIND_ADDR};

/// Configuration loading or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`GridConfig`]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Environment variable has an unusable value
    #[error("invalid value for {var}: {value:?}")]
    Env {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// A setting is out of range
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        /// Dotted field name, e.g. `robot.tick_interval_ms`
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// `[server]` section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Listen address
    pub bind_addr: String,
    /// Idle time after which a connection is closed
    pub read_timeout_ms: u64,
    /// Longest accepted request line in bytes
    pub max_line_length: usize,
    /// Connections handled at once
    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            read_timeout_ms: 500,
            max_line_length: 1024,
            max_connections: 64,
        }
    }
}

/// `[robot]` section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobotSettings {
    /// Delay between applied queued actions
    pub tick_interval_ms: u64,
}

impl Default for RobotSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
        }
    }
}

/// `[protocol]` section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolSettings {
    /// Reply `ERROR <reason>` to malformed lines instead of `OK`
    pub strict_replies: bool,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            strict_replies: true,
        }
    }
}

/// Full configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Robot/scheduler settings
    pub robot: RobotSettings,
    /// Reply behaviour
    pub protocol: ProtocolSettings,
}

impl GridConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown fields.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a specific file
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable or invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Load from `path` if given, else from the default location if it exists,
    /// then apply environment overrides and validate
    ///
    /// # Errors
    ///
    /// An explicit path that cannot be loaded is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_from(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GRIDBOT_*` overrides using `lookup` to read variables
    ///
    /// - `GRIDBOT_BIND`: listen address
    /// - `GRIDBOT_TICK_MS`: tick interval in ms
    /// - `GRIDBOT_READ_TIMEOUT_MS`: connection idle timeout in ms
    /// - `GRIDBOT_STRICT_REPLIES`: `1`/`true` or `0`/`false`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] for values that do not parse.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(addr) = lookup("GRIDBOT_BIND") {
            self.server.bind_addr = addr;
        }
        if let Some(value) = lookup("GRIDBOT_TICK_MS") {
            self.robot.tick_interval_ms = parse_env("GRIDBOT_TICK_MS", value)?;
        }
        if let Some(value) = lookup("GRIDBOT_READ_TIMEOUT_MS") {
            self.server.read_timeout_ms = parse_env("GRIDBOT_READ_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("GRIDBOT_STRICT_REPLIES") {
            self.protocol.strict_replies = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: "GRIDBOT_STRICT_REPLIES",
                        value,
                    })
                }
            };
        }
        Ok(())
    }

    /// Check ranges and formats
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.robot.tick_interval_ms == 0 {
            return Err(invalid("robot.tick_interval_ms", "must be greater than 0"));
        }
        if self.server.read_timeout_ms == 0 {
            return Err(invalid("server.read_timeout_ms", "must be greater than 0"));
        }
        if self.server.max_line_length == 0 {
            return Err(invalid("server.max_line_length", "must be greater than 0"));
        }
        if self.server.max_connections == 0 {
            return Err(invalid("server.max_connections", "must be greater than 0"));
        }
        Ok(())
    }

    /// Parsed listen address
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `server.bind_addr` is not `host:port`.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid("server.bind_addr", e.to_string()))
    }

    /// Tick interval as a `Duration`
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.robot.tick_interval_ms)
    }

    /// Connection idle timeout as a `Duration`
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.server.read_timeout_ms)
    }

    /// Reply mode selected by `protocol.strict_replies`
    #[must_use]
    pub fn reply_mode(&self) -> ReplyMode {
        if self.protocol.strict_replies {
            ReplyMode::Strict
        } else {
            ReplyMode::Lenient
        }
    }
}

/// `$XDG_CONFIG_HOME/gridbot/gridbot.toml`, if a config directory exists
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gridbot").join("gridbot.toml"))
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
