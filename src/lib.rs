//! Request dispatch core for a reverse-proxy client.
//!
//! Given a request for one backend service, selects a healthy origin, forwards
//! the request over a pooled connection, sanitizes the response and retries
//! against other origins under a bounded budget.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::BackendServiceConfig;
pub use dispatch::RequestDispatcher;
pub use error::{ConfigError, DispatchError, TransportError};
