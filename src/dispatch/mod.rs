//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request for one backend service
//!     → routing::rewrite (once per logical request)
//!     → load_balancer (choose with sticky preference + avoid-list)
//!     → http::client (origin connection client)
//!         ok  → sticky cookie → error-status metrics → http::response (sanitize)
//!               → origin id header → caller
//!         err → resilience::retries (policy decides) → next attempt or failure
//! ```
//!
//! # Design Decisions
//! - Explicit attempt loop instead of recursion; the cap is checked first
//! - Tried hosts are owned by the dispatch call and never shared
//! - Cancellation is observed through drop, recorded, and never retried
//! - Bodies over the replay limit are streamed to one origin and never retried

mod body;
pub mod dispatcher;

pub use dispatcher::{DispatcherBuilder, RequestDispatcher, DEFAULT_MAX_BUFFERED_BODY, MAX_ATTEMPTS};
