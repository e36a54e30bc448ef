//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! backend service file (TOML)
//!     → loader.rs (parse & deserialize into BackendServiceBuilder)
//!     → schema.rs (builder normalizes origins, drops disabled health checks)
//!     → validation.rs (semantic checks)
//!     → BackendServiceConfig (validated, immutable)
//!     → shared via Arc with the dispatcher and every in-flight request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; changes go through `to_builder()` and a new build
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    BackendServiceBuilder, BackendServiceConfig, Certificate, ConnectionPoolSettings,
    HealthCheckConfig, Origin, Protocol, RewriteConfig, StickySessionConfig, TlsSettings,
};
pub use validation::ValidationError;
