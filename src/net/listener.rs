//! TCP listener with a connection limit.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Enforce `max_connections` via a semaphore
//! - Hand each accepted connection out as a ready [`SocketContext`]

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;
use crate::context::SocketContext;
use crate::net::connection::ConnectionTracker;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The connection limit semaphore was closed.
    #[error("listener closed")]
    Closed,
}

/// A bound TCP listener that limits concurrent connections.
///
/// When the limit is reached, `accept` waits until a slot is released by a
/// closing socket.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(listener, config.max_connections))
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Self {
        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections,
                "Listener bound"
            );
        }

        Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept the next connection as a socket-backed exchange context.
    pub async fn accept(&self) -> Result<SocketContext, ListenerError> {
        // Acquire the slot before accepting so backpressure reaches the kernel queue.
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let guard = self.tracker.track();

        tracing::debug!(
            connection_id = %guard.id(),
            peer_addr = %peer_addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok(SocketContext::accepted(
            stream,
            peer_addr,
            guard,
            ConnectionPermit { _permit: permit },
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }
}

/// A connection slot, released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
