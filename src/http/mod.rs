//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher attempt
//!     → request.rs (request ID, interceptor context)
//!     → client.rs (origin connection client, pooled transport)
//!         → pool.rs (per-origin in-flight cap and pending queue)
//!     → response.rs (strip unexpected bodies, fix framing, origin id)
//!     → Back to caller
//! ```

pub mod client;
pub mod pool;
pub mod request;
pub mod response;

pub use client::{HyperOriginClient, OriginClient};
pub use request::{InterceptorContext, RequestId, X_REQUEST_ID};
