//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limit)
//!     → connection.rs (id, live-connection tracking)
//!     → SocketContext handed to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Slots are acquired before `accept`, so a full server stops draining the kernel queue
//! - The slot and tracker guard live inside the context and are released when it closes

pub mod connection;
pub mod listener;
