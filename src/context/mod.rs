//! Exchange contexts: one HTTP request/response cycle and its transport.
//!
//! # Data Flow
//! ```text
//! acceptor / internal caller
//!     → creates a context (socket.rs for clients, memory.rs for in-process calls)
//!     → request parser calls set_request()
//!     → handler mutates response headers, calls send_buffer() / send_response()
//!     → close_connection() (exactly one effective call)
//!     → context dropped, transport released
//! ```
//!
//! # Design Decisions
//! - One flat trait, two implementers; no shared base state
//! - Transport errors never leave this module; they are logged and counted
//! - Sending after closure is a logged no-op on every backend

pub mod memory;
pub mod signal;
pub mod socket;

use std::future::Future;

use http::StatusCode;
use thiserror::Error;

use crate::http::headers::Headers;
use crate::http::request::RequestHead;
use crate::http::response::{self, CONTENT_LENGTH};
use crate::observability::metrics;

pub use memory::MemoryContext;
pub use signal::{completion_channel, CompletionSignal, CompletionWaiter};
pub use socket::{Connection, SocketContext, SocketState};

/// Errors surfaced by exchange contexts.
///
/// Transport failures never show up here; they are logged and discarded
/// where they occur.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A response header cannot be serialized. This is a bug in the code
    /// that populated the headers.
    #[error("malformed response header {name:?}: {reason}")]
    MalformedHeader { name: String, reason: &'static str },

    /// The request head was already populated.
    #[error("request head already set")]
    RequestAlreadySet,

    /// The completion signal was dropped without the exchange finishing.
    #[error("exchange abandoned before completion")]
    Abandoned,

    /// Waiting for completion exceeded the caller's deadline.
    #[error("exchange not completed within {0:?}")]
    TimedOut(std::time::Duration),
}

/// Capability surface shared by every transport.
pub trait ListenerContext: Send {
    /// `true` until the exchange has been closed.
    fn can_send_data(&self) -> bool;

    /// Bytes of response output produced so far.
    fn content_length(&self) -> u64;

    /// Write `buffer` to the transport. A no-op once closed.
    fn send_buffer(&mut self, buffer: &[u8]) -> impl Future<Output = ()> + Send;

    /// Finish the exchange. Idempotent and infallible.
    fn close_connection(&mut self) -> impl Future<Output = ()> + Send;

    fn request(&self) -> Option<&RequestHead>;

    /// Attach the parsed request. Only the first call succeeds.
    fn set_request(&mut self, head: RequestHead) -> Result<(), ContextError>;

    fn response_headers(&self) -> &Headers;

    fn response_headers_mut(&mut self) -> &mut Headers;

    /// Backend label attached to metrics.
    fn transport(&self) -> &'static str;

    /// Write the status line and headers, then close the exchange.
    ///
    /// The exchange is closed even when the headers are malformed; in that
    /// case nothing is written and the fault is returned.
    fn send_response(&mut self, status: StatusCode) -> impl Future<Output = Result<(), ContextError>> + Send {
        async move {
            let preamble = response::preamble(status, self.response_headers());
            let result = match preamble {
                Ok(preamble) => {
                    self.send_buffer(preamble.as_bytes()).await;
                    metrics::record_response(status, self.transport());
                    Ok(())
                }
                Err(e) => Err(e),
            };
            self.close_connection().await;
            result
        }
    }

    /// Like [`send_response`](Self::send_response), followed by `body`.
    ///
    /// `Content-Length` is set from `body` unless the handler already set it.
    fn send_response_with_body(
        &mut self,
        status: StatusCode,
        body: &[u8],
    ) -> impl Future<Output = Result<(), ContextError>> + Send {
        async move {
            if !self.response_headers().contains(CONTENT_LENGTH) {
                self.response_headers_mut()
                    .insert(CONTENT_LENGTH, body.len().to_string());
            }
            let preamble = response::preamble(status, self.response_headers());
            let result = match preamble {
                Ok(preamble) => {
                    self.send_buffer(preamble.as_bytes()).await;
                    self.send_buffer(body).await;
                    metrics::record_response(status, self.transport());
                    Ok(())
                }
                Err(e) => Err(e),
            };
            self.close_connection().await;
            result
        }
    }
}
