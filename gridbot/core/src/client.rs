//! Protocol Client
//!
//! Talks to a running grid server. The server closes each connection after
//! the batch it received, so every call opens a fresh connection, writes one
//! line, reads one reply line and closes.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::protocol::{parse_dimensions, parse_position};
use crate::robot::RobotSnapshot;
use crate::translator::TranslatedCommand;

/// Client-side failure talking to the server
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing is listening at the address
    #[error("connection refused: is the grid server running on {0}?")]
    ConnectionRefused(SocketAddr),

    /// Connect or read took too long
    #[error("timed out talking to {0}")]
    Timeout(SocketAddr),

    /// Other socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with something unexpected
    #[error("invalid response: {0:?}")]
    InvalidResponse(String),
}

/// One-shot protocol client
#[derive(Clone, Debug)]
pub struct GridClient {
    addr: SocketAddr,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl GridClient {
    /// Client for `addr` with 5 s connect and read timeouts
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }

    /// Override the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Override the read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Server address
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Check that the server accepts connections
    ///
    /// # Errors
    ///
    /// Returns the connection failure.
    pub async fn probe(&self) -> Result<(), ClientError> {
        let stream = self.connect().await?;
        drop(stream);
        Ok(())
    }

    /// Send one raw protocol line and return the reply line (trimmed)
    ///
    /// An empty string means the server closed without replying.
    ///
    /// # Errors
    ///
    /// Connection, timeout and I/O failures.
    pub async fn send_raw(&self, line: &str) -> Result<String, ClientError> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();

        debug!(addr = %self.addr, line, "Sending command");
        write_half
            .write_all(format!("{}\n", line.trim()).as_bytes())
            .await?;

        let mut reply = String::new();
        let mut reader = BufReader::new(read_half);
        timeout(self.read_timeout, reader.read_line(&mut reply))
            .await
            .map_err(|_| ClientError::Timeout(self.addr))??;

        // Let the server see EOF so it closes promptly
        let _ = write_half.shutdown().await;

        let reply = reply.trim().to_string();
        debug!(reply, "Received reply");
        Ok(reply)
    }

    /// Current position and heading
    ///
    /// # Errors
    ///
    /// Transport errors, or [`ClientError::InvalidResponse`] if the reply is not a position.
    pub async fn position(&self) -> Result<RobotSnapshot, ClientError> {
        let reply = self.send_raw("GET_POSITION").await?;
        parse_position(&reply).ok_or(ClientError::InvalidResponse(reply))
    }

    /// Grid size as `(width, height)`
    ///
    /// # Errors
    ///
    /// Transport errors, or [`ClientError::InvalidResponse`] if the reply is malformed.
    pub async fn dimensions(&self) -> Result<(u32, u32), ClientError> {
        let reply = self.send_raw("GET_DIMENSIONS").await?;
        parse_dimensions(&reply).ok_or(ClientError::InvalidResponse(reply))
    }

    /// Run a translated command and describe the outcome for a human
    ///
    /// # Errors
    ///
    /// Transport errors and malformed replies.
    pub async fn execute(&self, command: &TranslatedCommand) -> Result<String, ClientError> {
        match command {
            TranslatedCommand::Position => Ok(self.position().await?.describe()),
            TranslatedCommand::Center => {
                self.send_raw(&command.wire_line()).await?;
                Ok("Robot centered".to_string())
            }
            _ => {
                let reply = self.send_raw(&command.wire_line()).await?;
                if reply.is_empty() {
                    Ok("Command executed".to_string())
                } else {
                    Ok(reply)
                }
            }
        }
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        match timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
            Err(_) => Err(ClientError::Timeout(self.addr)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(ClientError::ConnectionRefused(self.addr))
            }
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Ok(Ok(stream)) => Ok(stream),
        }
    }
}
