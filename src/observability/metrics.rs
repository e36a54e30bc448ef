//! Metrics collection.
//!
//! # Metrics
//! - `proxy_origin_error_responses_total` (counter): origin responses with status >= 400, by app, status
//! - `proxy_origin_requests_cancelled_total` (counter): cancelled in-flight requests, by app, origin
//! - `proxy_dispatch_attempts_total` (counter): forwarding attempts, by app, outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; installing an exporter is the host's job
//! - Labels for app, origin, status code

/// Outcome label for a single forwarding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    NoHost,
}

impl AttemptOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failure",
            AttemptOutcome::NoHost => "no_host",
        }
    }
}

/// Record an origin response carrying an error status.
pub fn record_error_response(app_id: &str, status: u16) {
    metrics::counter!(
        "proxy_origin_error_responses_total",
        "app" => app_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a request cancelled by the consumer while in flight.
pub fn record_request_cancelled(app_id: &str, origin_id: &str) {
    metrics::counter!(
        "proxy_origin_requests_cancelled_total",
        "app" => app_id.to_string(),
        "origin" => origin_id.to_string()
    )
    .increment(1);
}

/// Record the outcome of one forwarding attempt.
pub fn record_attempt(app_id: &str, outcome: AttemptOutcome) {
    metrics::counter!(
        "proxy_dispatch_attempts_total",
        "app" => app_id.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}
