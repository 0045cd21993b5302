//! Socket-backed exchange context.
//!
//! # States
//! ```text
//! Open → Sending → Closed
//! ```
//! `Closed` is terminal. Entering it shuts the stream down, drops it (which
//! closes the descriptor) and releases the listener slot.
//!
//! Writes are best effort: once a client goes away mid-response the write
//! error is logged, counted and discarded, and the exchange ends closed with
//! a truncated response.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;

use crate::context::{ContextError, ListenerContext};
use crate::http::headers::Headers;
use crate::http::request::RequestHead;
use crate::net::connection::{ConnectionGuard, ConnectionId};
use crate::net::listener::ConnectionPermit;
use crate::observability::metrics;

/// A byte stream that can report whether its peer is still there.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {
    fn is_connected(&self) -> bool;
}

impl Connection for TcpStream {
    fn is_connected(&self) -> bool {
        self.peer_addr().is_ok()
    }
}

impl Connection for DuplexStream {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Lifecycle of a socket-backed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Connected, nothing written yet.
    Open,
    /// At least one write has been attempted.
    Sending,
    /// Torn down.
    Closed,
}

/// Exchange context that owns a live connection.
#[derive(Debug)]
pub struct SocketContext<S = TcpStream> {
    id: ConnectionId,
    stream: Option<S>,
    peer_addr: Option<SocketAddr>,
    state: SocketState,
    /// Set after a read or write fails; the peer is treated as gone and
    /// later writes are skipped.
    broken: bool,
    bytes_sent: u64,
    request: Option<RequestHead>,
    response_headers: Headers,
    guard: Option<ConnectionGuard>,
    permit: Option<ConnectionPermit>,
}

impl<S: Connection> SocketContext<S> {
    pub fn new(stream: S) -> Self {
        Self {
            id: ConnectionId::new(),
            stream: Some(stream),
            peer_addr: None,
            state: SocketState::Open,
            broken: false,
            bytes_sent: 0,
            request: None,
            response_headers: Headers::new(),
            guard: None,
            permit: None,
        }
    }

    /// Context for a freshly accepted connection.
    ///
    /// The tracker guard and listener permit are held until the socket is
    /// closed.
    pub fn accepted(
        stream: S,
        peer_addr: SocketAddr,
        guard: ConnectionGuard,
        permit: ConnectionPermit,
    ) -> Self {
        let mut ctx = Self::new(stream);
        ctx.id = guard.id();
        ctx.peer_addr = Some(peer_addr);
        ctx.guard = Some(guard);
        ctx.permit = Some(permit);
        ctx
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Closed by us, or the peer is known to be gone.
    pub fn socket_closed(&self) -> bool {
        if self.state == SocketState::Closed || self.broken {
            return true;
        }
        self.stream.as_ref().map_or(true, |stream| !stream.is_connected())
    }

    /// Read the request head off the stream and attach it.
    ///
    /// Returns `None` if the peer closed early, the head exceeded `limit`
    /// bytes or could not be parsed. Bytes past the blank line are ignored.
    pub async fn read_request_head(&mut self, limit: usize) -> Option<&RequestHead> {
        if self.request.is_none() {
            let raw = self.read_head_bytes(limit).await?;
            let Some(head) = RequestHead::parse(&raw) else {
                tracing::debug!(connection_id = %self.id, "Unparseable request head");
                return None;
            };
            tracing::debug!(
                connection_id = %self.id,
                method = %head.method,
                uri = %head.uri,
                "Request head read"
            );
            self.request = Some(head);
        }
        self.request.as_ref()
    }

    async fn read_head_bytes(&mut self, limit: usize) -> Option<Vec<u8>> {
        let stream = self.stream.as_mut()?;
        let mut raw = Vec::with_capacity(1024);
        let mut chunk = [0u8; 1024];

        loop {
            if let Some(end) = find_head_end(&raw) {
                raw.truncate(end);
                return Some(raw);
            }
            if raw.len() > limit {
                tracing::debug!(connection_id = %self.id, limit, "Request head too large");
                return None;
            }
            match stream.read(&mut chunk).await {
                Ok(0) => return None,
                Ok(n) => raw.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    self.broken = true;
                    metrics::record_transport_error("read");
                    tracing::debug!(connection_id = %self.id, error = %e, "Ignoring read error");
                    return None;
                }
            }
        }
    }

    /// Tear the connection down. Safe to call any number of times.
    pub async fn close_socket(&mut self) {
        if self.state == SocketState::Closed {
            return;
        }
        let disconnected = self.socket_closed();
        self.state = SocketState::Closed;

        if let Some(mut stream) = self.stream.take() {
            if !disconnected {
                if let Err(e) = stream.shutdown().await {
                    metrics::record_transport_error("shutdown");
                    tracing::debug!(connection_id = %self.id, error = %e, "Ignoring socket shutdown error");
                }
            }
            drop(stream);
        }
        self.permit = None;
        self.guard = None;

        tracing::debug!(
            connection_id = %self.id,
            bytes_sent = self.bytes_sent,
            disconnected,
            "Socket closed"
        );
    }

    /// Write `buffer`, discarding any transport error.
    async fn send_buffer_safe(&mut self, buffer: &[u8]) {
        if self.broken {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        self.state = SocketState::Sending;

        match write_all_flush(stream, buffer).await {
            Ok(()) => {
                self.bytes_sent += buffer.len() as u64;
                metrics::record_bytes_sent(metrics::TRANSPORT_SOCKET, buffer.len());
            }
            Err(e) => {
                self.broken = true;
                metrics::record_transport_error("write");
                tracing::debug!(
                    connection_id = %self.id,
                    peer_addr = ?self.peer_addr,
                    error = %e,
                    "Client went away mid-response, dropping write"
                );
            }
        }
    }
}

/// Offset just past the blank line ending the head.
fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

async fn write_all_flush<S: Connection>(stream: &mut S, buffer: &[u8]) -> io::Result<()> {
    stream.write_all(buffer).await?;
    stream.flush().await
}

impl<S: Connection> ListenerContext for SocketContext<S> {
    fn can_send_data(&self) -> bool {
        self.state != SocketState::Closed
    }

    /// Bytes successfully written; nothing is retained.
    fn content_length(&self) -> u64 {
        self.bytes_sent
    }

    async fn send_buffer(&mut self, buffer: &[u8]) {
        if self.state == SocketState::Closed {
            tracing::warn!(connection_id = %self.id, len = buffer.len(), "Discarding write to closed socket");
            return;
        }
        self.send_buffer_safe(buffer).await;
    }

    async fn close_connection(&mut self) {
        self.close_socket().await;
    }

    fn request(&self) -> Option<&RequestHead> {
        self.request.as_ref()
    }

    fn set_request(&mut self, head: RequestHead) -> Result<(), ContextError> {
        if self.request.is_some() {
            return Err(ContextError::RequestAlreadySet);
        }
        self.request = Some(head);
        Ok(())
    }

    fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    fn response_headers_mut(&mut self) -> &mut Headers {
        &mut self.response_headers
    }

    fn transport(&self) -> &'static str {
        metrics::TRANSPORT_SOCKET
    }
}
