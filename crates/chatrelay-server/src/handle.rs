use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::registry::ConnectionRegistry;

/// Read-only snapshot of a running server, for status reporting.
#[derive(Clone, Debug, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub host: String,
    pub port: u16,
    pub active_connections: usize,
}

/// Handle returned by a server's `start()` — owns the shutdown path and
/// keeps the acceptor task alive.
pub struct ServerHandle {
    host: String,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    acceptor: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub(crate) fn new(
        host: String,
        local_addr: SocketAddr,
        running: Arc<AtomicBool>,
        shutdown: CancellationToken,
        registry: Arc<ConnectionRegistry>,
        acceptor: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            host,
            local_addr,
            running,
            shutdown,
            registry,
            acceptor,
        }
    }

    /// Actual bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            running: self.is_running(),
            host: self.host.clone(),
            port: self.local_addr.port(),
            active_connections: self.registry.count(),
        }
    }

    /// Full teardown: stop accepting, wake every handler's blocking read,
    /// and wait for the acceptor to finish. Handlers unregister themselves
    /// as they observe the close signal.
    pub async fn shutdown(self) {
        tracing::info!(addr = %self.local_addr, "shutting down server");
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        let closed = self.registry.close_all();
        if closed > 0 {
            tracing::info!(connections = closed, "closing active connections");
        }
        let _ = self.acceptor.await;
        tracing::info!("server shutdown complete");
    }
}
