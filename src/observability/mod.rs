//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher produces:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//!     → origin_stats.rs (per-origin cancellation / error counters)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log event of a dispatch
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod origin_stats;

pub use origin_stats::{OriginStats, OriginStatsRegistry, OriginStatsTracker};
