//! Request target rewriting.
//!
//! # Data Flow
//! ```text
//! RewriteConfig[] (from BackendServiceConfig)
//!     → rewrite.rs (compile once into RewriteRuleset)
//!     → applied to each inbound request target before origin selection
//! ```
//!
//! # Design Decisions
//! - Rules compiled at construction, immutable at runtime
//! - Deterministic: same input always produces the same target
//! - Runs exactly once per logical request, never per retry

pub mod rewrite;

pub use rewrite::{RewriteRule, RewriteRuleset};
