//! Protocol Server
//!
//! TCP accept loop for the line protocol:
//! - Accepts connections and spawns one handler task per connection
//! - Reads LF-terminated lines and replies to each as soon as it is complete
//! - Keeps executing a batch after the peer stops accepting replies
//! - Closes the connection on EOF, idle timeout, over-long line or read error
//! - Tracks active connections and enforces a connection limit
//! - Aborts in-flight handlers on shutdown
//!
//! Clients are expected to open a fresh connection per command batch.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::GridConfig;
use crate::grid::RobotGrid;
use crate::protocol::{respond, Reply, ReplyMode};

/// Server failure
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Other socket error
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection identifier, `conn-<uuid>`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Allocate a new random ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection tuning
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Idle time after which a connection is closed
    pub read_timeout: Duration,
    /// Longest accepted request line in bytes
    pub max_line_length: usize,
    /// Connections handled at once
    pub max_connections: usize,
    /// How rejected lines are answered
    pub reply_mode: ReplyMode,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from(&GridConfig::default())
    }
}

impl From<&GridConfig> for ServerOptions {
    fn from(config: &GridConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            max_line_length: config.server.max_line_length,
            max_connections: config.server.max_connections,
            reply_mode: config.reply_mode(),
        }
    }
}

/// Information about one live connection
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    /// Remote address
    pub peer: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
}

/// Shared view of the live connections
#[derive(Clone, Debug, Default)]
pub struct ConnectionTable {
    inner: Arc<DashMap<ConnectionId, ConnectionInfo>>,
}

impl ConnectionTable {
    /// Number of live connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no connection is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Copy of all live connections
    #[must_use]
    pub fn list(&self) -> Vec<(ConnectionId, ConnectionInfo)> {
        self.inner
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn insert(&self, id: ConnectionId, info: ConnectionInfo) {
        self.inner.insert(id, info);
    }

    fn remove(&self, id: &ConnectionId) {
        self.inner.remove(id);
    }
}

/// TCP server for the grid protocol
pub struct ProtocolServer {
    listener: TcpListener,
    grid: Arc<RobotGrid>,
    options: ServerOptions,
    connections: ConnectionTable,
}

impl ProtocolServer {
    /// Bind the listener
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        grid: Arc<RobotGrid>,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(addr = %listener.local_addr()?, "Listening for connections");

        Ok(Self {
            listener,
            grid,
            options,
            connections: ConnectionTable::default(),
        })
    }

    /// Address actually bound (useful with port 0)
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the live connection table
    #[must_use]
    pub fn connections(&self) -> ConnectionTable {
        self.connections.clone()
    }

    /// Accept connections until `shutdown` becomes `true`
    ///
    /// A failing connection never stops the loop.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok` once shutdown completes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("Shutdown requested, stopping accept loop");
                    break;
                }

                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Connection handler panicked");
                        }
                    }
                }

                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    if self.connections.len() >= self.options.max_connections {
                        warn!(%peer, limit = self.options.max_connections, "Connection limit reached, rejecting new connection");
                        drop(stream);
                        continue;
                    }

                    let conn_id = ConnectionId::new();
                    self.connections.insert(
                        conn_id,
                        ConnectionInfo {
                            peer,
                            connected_at: Instant::now(),
                        },
                    );
                    info!(
                        %conn_id,
                        %peer,
                        active_connections = self.connections.len(),
                        "New connection accepted"
                    );

                    let handler = Self::handle_connection(
                        conn_id,
                        stream,
                        Arc::clone(&self.grid),
                        self.options.clone(),
                        self.connections.clone(),
                    );
                    handlers.spawn(handler.instrument(tracing::info_span!("connection", %conn_id)));
                }
            }
        }

        let in_flight = handlers.len();
        if in_flight > 0 {
            info!(in_flight, "Aborting connection handlers");
            for (conn_id, conn) in self.connections.list() {
                debug!(
                    %conn_id,
                    peer = %conn.peer,
                    age_ms = conn.connected_at.elapsed().as_millis() as u64,
                    "Aborting connection"
                );
            }
        }
        handlers.shutdown().await;
        info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        conn_id: ConnectionId,
        stream: TcpStream,
        grid: Arc<RobotGrid>,
        options: ServerOptions,
        connections: ConnectionTable,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = Vec::with_capacity(128);
        let mut handled = 0usize;
        // Set once a reply write fails; later lines are still executed
        let mut peer_gone = false;

        loop {
            line.clear();
            let read = tokio::time::timeout(
                options.read_timeout,
                read_line(&mut reader, &mut line, options.max_line_length),
            )
            .await;

            let (text, last) = match read {
                Ok(Ok(LineRead::Line)) => (String::from_utf8_lossy(&line).into_owned(), false),
                Ok(Ok(LineRead::Eof)) => (String::from_utf8_lossy(&line).into_owned(), true),
                Ok(Ok(LineRead::TooLong)) => {
                    warn!(limit = options.max_line_length, "Line too long, closing");
                    if !peer_gone {
                        let reply = Reply::Error("line too long".to_string());
                        if let Err(e) = write_half.write_all(reply.to_line().as_bytes()).await {
                            debug!(error = %e, "Write failed");
                        }
                    }
                    break;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Read error");
                    break;
                }
                Err(_) => {
                    debug!("Read timed out");
                    // Whatever arrived before the timeout is the final command
                    (String::from_utf8_lossy(&line).into_owned(), true)
                }
            };

            if let Some(reply) = respond(&grid, &text, options.reply_mode) {
                handled += 1;
                if !peer_gone {
                    debug!(request = text.trim(), reply = %reply, "Replying");
                    if let Err(e) = write_half.write_all(reply.to_line().as_bytes()).await {
                        // Fire-and-forget clients close before reading replies
                        debug!(error = %e, "Write failed, executing rest of batch without replies");
                        peer_gone = true;
                    }
                }
            }

            if last {
                break;
            }
        }

        if !peer_gone {
            if let Err(e) = write_half.shutdown().await {
                debug!(error = %e, "Shutdown of write half failed");
            }
        }
        connections.remove(&conn_id);
        info!(
            handled,
            active_connections = connections.len(),
            "Connection closed"
        );
    }
}

enum LineRead {
    /// A complete LF-terminated line
    Line,
    /// End of stream; `buf` holds any unterminated trailing bytes
    Eof,
    /// No LF within the limit
    TooLong,
}

async fn read_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<LineRead>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
    let n = reader.take(limit).read_until(b'\n', buf).await?;

    if buf.last() == Some(&b'\n') {
        Ok(LineRead::Line)
    } else if buf.len() > max_len {
        Ok(LineRead::TooLong)
    } else {
        debug_assert!(n == buf.len());
        Ok(LineRead::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new();
        let formatted = format!("{id}");
        assert!(formatted.starts_with("conn-"));
        // conn- (5 chars) + UUID (36 chars)
        assert_eq!(formatted.len(), 41);
        assert_ne!(id, ConnectionId::new());
    }

    #[test]
    fn test_connection_table() {
        let table = ConnectionTable::default();
        let id = ConnectionId::new();
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        table.insert(id, ConnectionInfo { peer, connected_at: Instant::now() });
        assert_eq!(table.len(), 1);

        let listed = table.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, id);
        assert_eq!(listed[0].1.peer, peer);

        table.remove(&id);
        assert!(table.is_empty());
        assert!(table.list().is_empty());
    }

    #[test]
    fn test_server_options_from_config() {
        let mut config = GridConfig::default();
        config.protocol.strict_replies = false;
        config.server.read_timeout_ms = 1200;
        let options = ServerOptions::from(&config);
        assert_eq!(options.reply_mode, ReplyMode::Lenient);
        assert_eq!(options.read_timeout, Duration::from_millis(1200));
        assert_eq!(options.max_connections, 64);
    }

    #[tokio::test]
    async fn test_read_line_variants() {
        let data: &[u8] = b"GET_POSITION\nFORWARD 3\r\npartial";
        let mut reader = BufReader::new(data);
        let mut buf = Vec::new();

        assert!(matches!(
            read_line(&mut reader, &mut buf, 64).await.unwrap(),
            LineRead::Line
        ));
        assert_eq!(buf, b"GET_POSITION\n");

        buf.clear();
        read_line(&mut reader, &mut buf, 64).await.unwrap();
        assert_eq!(buf, b"FORWARD 3\r\n");

        buf.clear();
        assert!(matches!(
            read_line(&mut reader, &mut buf, 64).await.unwrap(),
            LineRead::Eof
        ));
        assert_eq!(buf, b"partial");
    }

    #[tokio::test]
    async fn test_read_line_too_long() {
        let data = vec![b'A'; 100];
        let mut reader = BufReader::new(&data[..]);
        let mut buf = Vec::new();
        assert!(matches!(
            read_line(&mut reader, &mut buf, 10).await.unwrap(),
            LineRead::TooLong
        ));
    }

    #[tokio::test]
    async fn test_line_at_exact_limit_is_accepted() {
        let data: &[u8] = b"0123456789\n";
        let mut reader = BufReader::new(data);
        let mut buf = Vec::new();
        assert!(matches!(
            read_line(&mut reader, &mut buf, 10).await.unwrap(),
            LineRead::Line
        ));
    }
}
