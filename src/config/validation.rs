//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject duplicate origins (by id and by address)
//! - Check the service path and rewrite patterns are well formed
//! - Validate value ranges (thresholds, intervals and connection caps > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BackendServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs once, inside the builder, before the config is handed out

use axum::http::uri::PathAndQuery;
use regex::Regex;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::BackendServiceConfig;

/// A single semantic problem with a backend service configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("application id must not be empty")]
    EmptyApplicationId,

    #[error("Invalid path. Path='{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("duplicate origin id '{id}' in application '{app_id}'")]
    DuplicateOriginId { app_id: String, id: String },

    #[error("duplicate origin address '{address}' in application '{app_id}'")]
    DuplicateOriginAddress { app_id: String, address: String },

    #[error("origin '{id}' has an empty host")]
    EmptyOriginHost { id: String },

    #[error("invalid rewrite pattern '{pattern}': {reason}")]
    InvalidRewritePattern { pattern: String, reason: String },

    #[error("invalid health check: {reason}")]
    InvalidHealthCheck { reason: String },

    #[error("invalid connection pool: {reason}")]
    InvalidConnectionPool { reason: String },
}

/// Validate a backend service, collecting every problem found.
pub fn validate_backend_service(config: &BackendServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.id().trim().is_empty() {
        errors.push(ValidationError::EmptyApplicationId);
    }

    if let Err(reason) = check_path(config.path()) {
        errors.push(ValidationError::InvalidPath {
            path: config.path().to_string(),
            reason,
        });
    }

    let mut ids = HashSet::new();
    let mut addresses = HashSet::new();
    for origin in config.origins() {
        if origin.host.trim().is_empty() {
            errors.push(ValidationError::EmptyOriginHost { id: origin.id.clone() });
        }
        if !ids.insert(origin.id.as_str()) {
            errors.push(ValidationError::DuplicateOriginId {
                app_id: config.id().to_string(),
                id: origin.id.clone(),
            });
        }
        let address = origin.host_and_port();
        if !addresses.insert(address.clone()) {
            errors.push(ValidationError::DuplicateOriginAddress {
                app_id: config.id().to_string(),
                address,
            });
        }
    }

    for rewrite in config.rewrites() {
        if let Err(e) = Regex::new(&rewrite.url_pattern) {
            errors.push(ValidationError::InvalidRewritePattern {
                pattern: rewrite.url_pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    let pool = config.connection_pool();
    if pool.max_connections_per_host == 0 || pool.max_connections_per_host > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::InvalidConnectionPool {
            reason: format!(
                "max connections per host must be between 1 and {}",
                Semaphore::MAX_PERMITS
            ),
        });
    }

    if let Some(hc) = config.health_check() {
        if hc.interval_millis == 0 {
            errors.push(ValidationError::InvalidHealthCheck {
                reason: "interval must be greater than zero".to_string(),
            });
        }
        if hc.healthy_threshold == 0 || hc.unhealthy_threshold == 0 {
            errors.push(ValidationError::InvalidHealthCheck {
                reason: "thresholds must be greater than zero".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err("must start with '/'".to_string());
    }
    PathAndQuery::from_str(path)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
