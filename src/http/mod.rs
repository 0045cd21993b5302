//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! SocketContext from the listener
//!     → server.rs (read head, run handler under a deadline, close)
//!     → handler writes through the ListenerContext contract
//!     → response.rs (status line + headers on the wire)
//!
//! Internal request:
//!     → server::dispatch_internal (MemoryContext + completion signal)
//!     → captured response bytes returned to the caller
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use headers::Headers;
pub use request::RequestHead;
pub use server::{dispatch_internal, FallbackHandler, Handler, HttpServer};
