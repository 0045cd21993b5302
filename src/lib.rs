//! Response delivery for a minimal hand-rolled HTTP/1.1 server.
//!
//! An exchange context represents one in-flight request/response cycle and
//! knows how to put a response on its transport and finish exactly once.
//! Two transports share the [`ListenerContext`] contract:
//!
//! - [`SocketContext`]: a live TCP connection; writes are best effort and
//!   teardown never fails
//! - [`MemoryContext`]: an in-process buffer, optionally waking a waiter
//!   through a [`CompletionSignal`] when the exchange closes

pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use context::{
    completion_channel, CompletionSignal, CompletionWaiter, ContextError, ListenerContext, MemoryContext,
    SocketContext,
};
pub use crate::http::{Handler, HttpServer};
pub use lifecycle::Shutdown;
