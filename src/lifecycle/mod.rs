//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Ctrl+C → Shutdown::trigger → server stops accepting
//!        → open exchanges finish or hit their deadline → drain → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
