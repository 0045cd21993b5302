//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! contexts, listener, server
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//! ```
//!
//! # Design Decisions
//! - Discarded transport errors are always visible here, never silent
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
