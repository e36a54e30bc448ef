//! Error types for dispatching and configuration.
//!
//! # Taxonomy
//! ```text
//! NoAvailableHosts  → load balancer found no eligible origin (retryable)
//! Transport         → origin connection client failed (retryable)
//! RetriesExhausted  → hard attempt cap reached (fatal, wraps last failure)
//! ```
//!
//! Cancellation is not an error: a dropped dispatch future simply stops.

use std::fmt;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Classification of a failure raised by an origin connection client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Could not establish a connection.
    Connect,
    /// Origin did not respond within the response timeout.
    Timeout,
    /// Connection dropped or reset mid-exchange.
    Io,
    /// Malformed exchange (bad framing, invalid request, etc.).
    Protocol,
    /// No connection slot freed up for the origin in time.
    PoolExhausted,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Protocol => "protocol",
            TransportErrorKind::PoolExhausted => "pool exhausted",
        };
        f.write_str(s)
    }
}

/// Failure surfaced by an origin's connection client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error talking to origin {origin_id}: {message}")]
pub struct TransportError {
    pub origin_id: String,
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(origin_id: impl Into<String>, kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            origin_id: origin_id.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn connect(origin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(origin_id, TransportErrorKind::Connect, message)
    }

    pub fn timeout(origin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(origin_id, TransportErrorKind::Timeout, message)
    }
}

/// Error returned by [`crate::dispatch::RequestDispatcher::dispatch`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No eligible origin was found for the application.
    #[error("No available hosts for application {app_id}")]
    NoAvailableHosts { app_id: String },

    /// The origin connection client failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The hard attempt cap was reached.
    #[error("Retries exhausted for application {app_id} after {attempts} attempts: {last}")]
    RetriesExhausted {
        app_id: String,
        attempts: u32,
        last: Box<DispatchError>,
    },

    /// The transport cannot speak the protocol the service requires.
    #[error("Unsupported protocol {protocol} for application {app_id}")]
    UnsupportedProtocol { app_id: String, protocol: String },
}

impl DispatchError {
    pub fn no_available_hosts(app_id: impl Into<String>) -> Self {
        DispatchError::NoAvailableHosts { app_id: app_id.into() }
    }

    /// The failure underneath any `RetriesExhausted` wrapping.
    pub fn root_cause(&self) -> &DispatchError {
        match self {
            DispatchError::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    pub fn is_no_available_hosts(&self) -> bool {
        matches!(self.root_cause(), DispatchError::NoAvailableHosts { .. })
    }

    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, DispatchError::RetriesExhausted { .. })
    }

    /// Short, stable name of the failure class, used in logs and metric labels.
    pub fn class(&self) -> &'static str {
        match self {
            DispatchError::NoAvailableHosts { .. } => "no_available_hosts",
            DispatchError::Transport(_) => "transport",
            DispatchError::RetriesExhausted { .. } => "retries_exhausted",
            DispatchError::UnsupportedProtocol { .. } => "unsupported_protocol",
        }
    }
}

/// Error type for configuration building and loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
