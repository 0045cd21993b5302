//! Serving loop and handler dispatch.
//!
//! # Responsibilities
//! - Accept connections and run one exchange per connection
//! - Bound each exchange with the configured deadline
//! - Close every context, whatever the handler did
//! - Run handlers in-process against a memory context
//! - Drain open connections on shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::{FallbackConfig, ServerConfig};
use crate::context::{completion_channel, ContextError, ListenerContext, MemoryContext, SocketContext};
use crate::http::request::RequestHead;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

/// Code that produces a response for one exchange.
///
/// Handlers see only the [`ListenerContext`] contract, so the same handler
/// serves network clients and internal callers.
pub trait Handler: Send + Sync + 'static {
    fn handle<C: ListenerContext>(&self, ctx: &mut C) -> impl Future<Output = Result<(), ContextError>> + Send;
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Accept loop over a [`Listener`].
pub struct HttpServer<H> {
    handler: Arc<H>,
    exchange_timeout: Duration,
    drain_timeout: Duration,
    max_head_bytes: usize,
}

impl<H: Handler> HttpServer<H> {
    pub fn new(handler: H, config: &ServerConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            exchange_timeout: Duration::from_secs(config.timeouts.exchange_secs),
            drain_timeout: Duration::from_secs(config.timeouts.drain_secs),
            max_head_bytes: config.listener.max_head_bytes,
        }
    }

    /// Serve until `shutdown` fires, then wait for open exchanges.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(ctx) => {
                        let handler = Arc::clone(&self.handler);
                        let exchange_timeout = self.exchange_timeout;
                        let max_head_bytes = self.max_head_bytes;
                        tokio::spawn(async move {
                            serve_connection(handler, ctx, exchange_timeout, max_head_bytes).await;
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        metrics::record_transport_error("accept");
                        tracing::warn!(error = %e, "Accept failed");
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }

        let open = listener.tracker().active_count();
        tracing::info!(open_connections = open, "Draining connections");
        if !listener.tracker().wait_for_drain(self.drain_timeout).await {
            tracing::warn!(
                open_connections = listener.tracker().active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection<H: Handler>(
    handler: Arc<H>,
    mut ctx: SocketContext,
    exchange_timeout: Duration,
    max_head_bytes: usize,
) {
    let connection_id = ctx.id();
    let exchange = async {
        if ctx.read_request_head(max_head_bytes).await.is_none() {
            return ctx.send_response(StatusCode::BAD_REQUEST).await;
        }
        handler.handle(&mut ctx).await
    };

    match tokio::time::timeout(exchange_timeout, exchange).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(connection_id = %connection_id, error = %e, "Handler failed"),
        Err(_) => {
            metrics::record_timeout();
            tracing::warn!(connection_id = %connection_id, timeout = ?exchange_timeout, "Exchange timed out");
        }
    }
    ctx.close_connection().await;
}

/// Run `handler` for `request` in-process and return the raw response.
///
/// The handler runs on its own task against a [`MemoryContext`]; this
/// waits on the completion signal until the context is closed.
pub async fn dispatch_internal<H: Handler>(handler: Arc<H>, request: RequestHead) -> Result<Vec<u8>, ContextError> {
    let (signal, mut waiter) = completion_channel();
    let mut ctx = MemoryContext::with_signal(Vec::new(), signal);
    ctx.set_request(request)?;

    tokio::spawn(async move {
        if let Err(e) = handler.handle(&mut ctx).await {
            tracing::error!(error = %e, "Internal handler failed");
        }
        ctx.close_connection().await;
    });

    waiter.wait().await
}

/// Answers every request with the configured canned response.
#[derive(Debug, Clone)]
pub struct FallbackHandler {
    status: StatusCode,
    content_type: String,
    body: Vec<u8>,
}

impl FallbackHandler {
    pub fn new(status: StatusCode, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Build from config. Invalid status codes fall back to 500.
    pub fn from_config(config: &FallbackConfig) -> Self {
        let status = StatusCode::from_u16(config.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, config.content_type.clone(), config.body.clone())
    }
}

impl Handler for FallbackHandler {
    async fn handle<C: ListenerContext>(&self, ctx: &mut C) -> Result<(), ContextError> {
        ctx.response_headers_mut().insert("Content-Type", self.content_type.as_str());
        ctx.send_response_with_body(self.status, &self.body).await
    }
}
