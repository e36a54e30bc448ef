//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to origin:
//!     → timeouts.rs (enforce the service's response timeout)
//!     → On failure: retries.rs (policy decides on a fresh RetryContext)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every origin call has a deadline
//! - Retry policies are pluggable; the dispatcher enforces a hard cap regardless

pub mod retries;
pub mod timeouts;

pub use retries::{RetryContext, RetryDecision, RetryPolicy};
