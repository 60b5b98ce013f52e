use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for one client connection.
///
/// TCP connections are identified by their peer endpoint; message-oriented
/// transports get a generated session token.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }

    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to one open connection, as seen by the registry.
///
/// The transport itself stays owned by the connection's handler task; the
/// registry only holds the cancellation token that can force the handler's
/// blocking read to wake up and tear down.
pub struct Connection {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub opened_at: DateTime<Utc>,
    closer: CancellationToken,
}

impl Connection {
    pub fn new(id: ConnectionId, peer: Option<SocketAddr>, closer: CancellationToken) -> Self {
        Self {
            id,
            peer,
            opened_at: Utc::now(),
            closer,
        }
    }

    /// Ask the owning handler to close. Idempotent.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.closer.is_cancelled()
    }
}

/// Process-wide table of currently open connections.
///
/// Register/unregister/count/close_all are all safe to call concurrently;
/// entries are removed exactly once by the owning handler's teardown path.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Ids derive from transport endpoints and do not
    /// collide while open, so a stale duplicate is simply overwritten.
    pub fn register(&self, conn: Arc<Connection>) {
        self.connections.insert(conn.id.clone(), conn);
    }

    /// Remove a connection. Idempotent — a second call is a no-op.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of currently open connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    /// Signal every registered connection to close. Used only during
    /// server-wide shutdown; handlers still unregister themselves.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for entry in self.connections.iter() {
            entry.value().close();
            closed += 1;
        }
        closed
    }
}
