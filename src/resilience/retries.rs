//! Retry contract.
//!
//! # Responsibilities
//! - Describe the state a retry policy decides on ([`RetryContext`])
//! - Define the pluggable [`RetryPolicy`] and its [`RetryDecision`]
//!
//! # Design Decisions
//! - Counting and backoff algorithms live outside this crate
//! - A context is built fresh per decision and borrows from the retry chain
//! - Policies only see failures; status codes never reach them

use axum::http::request::Parts;
use std::fmt;

use crate::error::DispatchError;
use crate::load_balancer::{LoadBalancer, Preferences, RemoteHost};

/// State handed to a retry policy after a failed attempt.
pub struct RetryContext<'a> {
    app_id: &'a str,
    attempt: u32,
    last_error: Option<&'a DispatchError>,
    request: &'a Parts,
    previous_origins: &'a [RemoteHost],
}

impl<'a> RetryContext<'a> {
    pub fn new(
        app_id: &'a str,
        attempt: u32,
        last_error: Option<&'a DispatchError>,
        request: &'a Parts,
        previous_origins: &'a [RemoteHost],
    ) -> Self {
        Self {
            app_id,
            attempt,
            last_error,
            request,
            previous_origins,
        }
    }

    pub fn app_id(&self) -> &str {
        self.app_id
    }

    /// Number of attempts made so far (1-based).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&DispatchError> {
        self.last_error
    }

    /// Head of the request as sent on the failed attempt.
    pub fn request(&self) -> &Parts {
        self.request
    }

    /// Hosts tried before the failed attempt, oldest first.
    pub fn previous_origins(&self) -> &[RemoteHost] {
        self.previous_origins
    }

    /// Comma-separated `host:port` of the hosts tried so far.
    pub fn hosts(&self) -> String {
        self.previous_origins
            .iter()
            .map(|h| h.origin().host_and_port())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for RetryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryContext")
            .field("app_id", &self.app_id)
            .field("attempt", &self.attempt)
            .field("last_error", &self.last_error)
            .field("request", &self.request.uri)
            .field("previous_origins", &self.hosts())
            .finish()
    }
}

/// Outcome of a retry evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    should_retry: bool,
}

impl RetryDecision {
    pub fn retry() -> Self {
        Self { should_retry: true }
    }

    pub fn stop() -> Self {
        Self { should_retry: false }
    }

    pub fn should_retry(&self) -> bool {
        self.should_retry
    }
}

impl From<bool> for RetryDecision {
    fn from(should_retry: bool) -> Self {
        Self { should_retry }
    }
}

/// Decides whether a failed attempt is followed by another.
pub trait RetryPolicy: Send + Sync {
    fn evaluate(
        &self,
        context: &RetryContext<'_>,
        load_balancer: &dyn LoadBalancer,
        preferences: &Preferences,
    ) -> RetryDecision;
}

/// Closures work as policies, which keeps call sites and tests small.
impl<F> RetryPolicy for F
where
    F: Fn(&RetryContext<'_>, &dyn LoadBalancer, &Preferences) -> RetryDecision + Send + Sync,
{
    fn evaluate(
        &self,
        context: &RetryContext<'_>,
        load_balancer: &dyn LoadBalancer,
        preferences: &Preferences,
    ) -> RetryDecision {
        self(context, load_balancer, preferences)
    }
}
