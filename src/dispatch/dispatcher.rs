//! Request dispatcher for one backend service.
//!
//! # Responsibilities
//! - Rewrite the request target once per logical request
//! - Select an origin, honouring sticky-session and avoid-list preferences
//! - Forward over the origin's connection client and sanitize the response
//! - Consult the retry policy after every failure, under a hard attempt cap
//! - Record cancellations against the origin that was in flight
//!
//! # Design Decisions
//! - Attempts are strictly sequential; the tried-hosts list belongs to one chain
//! - `MAX_ATTEMPTS` caps the chain no matter what the retry policy says
//! - Error statuses are recorded, never retried here
//! - No locks: shared state is the immutable config and thread-safe collaborators

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, HeaderName, HeaderValue, Request, Response};
use std::fmt;
use std::sync::Arc;

use crate::config::{BackendServiceConfig, Origin, ValidationError};
use crate::dispatch::body::ReplayBody;
use crate::error::{ConfigError, DispatchError};
use crate::http::request::InterceptorContext;
use crate::http::response::{self, DEFAULT_ORIGIN_ID_HEADER};
use crate::load_balancer::{sticky, LoadBalancer, Preferences, RemoteHost};
use crate::observability::metrics::{self, AttemptOutcome};
use crate::observability::{OriginStatsRegistry, OriginStatsTracker};
use crate::resilience::retries::{RetryContext, RetryPolicy};
use crate::routing::rewrite::RewriteRuleset;

/// Hard cap on attempts per logical request.
pub const MAX_ATTEMPTS: u32 = 3;

/// Largest request body buffered for replay across attempts.
pub const DEFAULT_MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Dispatches requests to the origins of one backend service.
pub struct RequestDispatcher {
    config: Arc<BackendServiceConfig>,
    rewrite_ruleset: RewriteRuleset,
    load_balancer: Arc<dyn LoadBalancer>,
    retry_policy: Arc<dyn RetryPolicy>,
    origin_stats: Arc<dyn OriginStatsTracker>,
    origins_restriction_cookie_name: Option<String>,
    origin_id_header: HeaderName,
    max_buffered_body: usize,
}

impl RequestDispatcher {
    pub fn builder(
        config: Arc<BackendServiceConfig>,
        load_balancer: Arc<dyn LoadBalancer>,
        retry_policy: Arc<dyn RetryPolicy>,
    ) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            load_balancer,
            retry_policy,
            origin_stats: Arc::new(OriginStatsRegistry::new()),
            origins_restriction_cookie_name: None,
            origin_id_header: DEFAULT_ORIGIN_ID_HEADER.to_string(),
            max_buffered_body: DEFAULT_MAX_BUFFERED_BODY,
        }
    }

    pub fn app_id(&self) -> &str {
        self.config.id()
    }

    pub fn config(&self) -> &BackendServiceConfig {
        &self.config
    }

    pub fn origin_id_header(&self) -> &HeaderName {
        &self.origin_id_header
    }

    /// Forward `request` to an origin, retrying on failure.
    ///
    /// Dropping the returned future cancels the in-flight attempt; the origin
    /// being called is credited with a cancelled request and no retry follows.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        context: &InterceptorContext,
    ) -> Result<Response<Body>, DispatchError> {
        let (mut head, body) = request.into_parts();
        head.uri = self.rewrite_ruleset.rewrite(&head.uri);

        let mut body = ReplayBody::read(&head, body, self.max_buffered_body).await;
        if !body.is_replayable() {
            tracing::debug!(
                request_id = %context.request_id(),
                app_id = %self.app_id(),
                limit = self.max_buffered_body,
                "Request body exceeds the replay buffer; single attempt only"
            );
        }

        let preferred_origin = sticky::preferred_origin(
            &head.headers,
            self.app_id(),
            self.origins_restriction_cookie_name.as_deref(),
        );

        let mut previous_origins: Vec<RemoteHost> = Vec::new();
        let mut last_error: Option<DispatchError> = None;
        let mut attempt: u32 = 0;

        loop {
            if attempt >= MAX_ATTEMPTS {
                let last = last_error.unwrap_or_else(|| DispatchError::no_available_hosts(self.app_id()));
                tracing::warn!(
                    request_id = %context.request_id(),
                    app_id = %self.app_id(),
                    attempts = attempt,
                    error = %last,
                    "Retries exhausted"
                );
                return Err(DispatchError::RetriesExhausted {
                    app_id: self.app_id().to_string(),
                    attempts: attempt,
                    last: Box::new(last),
                });
            }

            let preferences = Preferences::new(
                preferred_origin.clone(),
                previous_origins.iter().map(|h| h.origin().clone()).collect(),
            );
            let tried_before = previous_origins.len();

            let (attempt_head, failure) = match self.load_balancer.choose(&preferences) {
                Some(host) => {
                    tracing::debug!(
                        request_id = %context.request_id(),
                        app_id = %self.app_id(),
                        origin_id = %host.id(),
                        attempt = attempt + 1,
                        "Origin selected"
                    );

                    let attempt_head = self.prepare_head(&head, host.origin(), context);
                    match self.forward(&host, &attempt_head, body.for_attempt(), context).await {
                        Ok(response) => {
                            metrics::record_attempt(self.app_id(), AttemptOutcome::Success);
                            return Ok(response);
                        }
                        Err(e) => {
                            metrics::record_attempt(self.app_id(), AttemptOutcome::Failure);
                            self.origin_stats.origin_stats(host.origin()).transport_error();
                            log_error(&attempt_head, host.origin(), context, &e);
                            previous_origins.push(host);
                            (attempt_head, e)
                        }
                    }
                }
                None => {
                    metrics::record_attempt(self.app_id(), AttemptOutcome::NoHost);
                    tracing::warn!(
                        request_id = %context.request_id(),
                        app_id = %self.app_id(),
                        attempt = attempt + 1,
                        "No available hosts"
                    );
                    (head.clone(), DispatchError::no_available_hosts(self.app_id()))
                }
            };

            attempt += 1;

            // The policy sees the hosts tried before this attempt; the
            // balancer's avoid-list also carries the one that just failed.
            let retry_context = RetryContext::new(
                self.app_id(),
                attempt,
                Some(&failure),
                &attempt_head,
                &previous_origins[..tried_before],
            );
            let avoid = Preferences::avoiding(&previous_origins);
            let decision = self
                .retry_policy
                .evaluate(&retry_context, self.load_balancer.as_ref(), &avoid);
            let retry = decision.should_retry() && body.is_available();

            tracing::debug!(
                request_id = %context.request_id(),
                app_id = %self.app_id(),
                attempt,
                retry,
                policy_retry = decision.should_retry(),
                tried = %retry_context.hosts(),
                "Retry evaluated"
            );

            if !retry {
                return Err(failure);
            }
            last_error = Some(failure);
        }
    }

    /// Request head for one attempt: Host override and request id propagation.
    fn prepare_head(&self, head: &Parts, origin: &Origin, context: &InterceptorContext) -> Parts {
        let mut attempt_head = head.clone();
        if self.config.override_host_header() && !origin.host.trim().is_empty() {
            match HeaderValue::from_str(&origin.host) {
                Ok(value) => {
                    attempt_head.headers.insert(header::HOST, value);
                }
                Err(e) => {
                    tracing::warn!(origin_id = %origin.id, error = %e, "Origin host is not a valid Host header");
                }
            }
        }
        context.propagate_request_id(&mut attempt_head.headers);
        attempt_head
    }

    async fn forward(
        &self,
        host: &RemoteHost,
        head: &Parts,
        body: Body,
        context: &InterceptorContext,
    ) -> Result<Response<Body>, DispatchError> {
        let request = Request::from_parts(head.clone(), body);

        let mut guard = CancellationGuard::new(self.origin_stats.as_ref(), self.app_id(), host.origin());
        let result = host.client().handle(request, context).await;
        guard.disarm();

        let response = self.add_sticky_session_identifier(result?, host.origin());
        self.record_error_status(&response, host.origin());
        let response = response::sanitize(&head.method, response);
        Ok(response::add_origin_id(&self.origin_id_header, host.id(), response))
    }

    fn add_sticky_session_identifier(&self, response: Response<Body>, origin: &Origin) -> Response<Body> {
        if !self.load_balancer.sticky_sessions_enabled() {
            return response;
        }
        match self.config.sticky_session().max_age() {
            Some(max_age) => sticky::add_sticky_session_cookie(response, self.app_id(), &origin.id, max_age),
            None => response,
        }
    }

    fn record_error_status(&self, response: &Response<Body>, origin: &Origin) {
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            metrics::record_error_response(self.app_id(), status.as_u16());
            self.origin_stats.origin_stats(origin).error_response(status.as_u16());
        }
    }
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("id", &self.config.id())
            .field("sticky_session", self.config.sticky_session())
            .field("rewrite_ruleset", &self.rewrite_ruleset.to_string())
            .field("override_host_header", &self.config.override_host_header())
            .field("origin_id_header", &self.origin_id_header)
            .finish_non_exhaustive()
    }
}

fn log_error(head: &Parts, origin: &Origin, context: &InterceptorContext, error: &DispatchError) {
    tracing::error!(
        request_id = %context.request_id(),
        client_addr = ?context.client_addr(),
        method = %head.method,
        uri = %head.uri,
        origin_id = %origin.id,
        error_class = error.class(),
        error = %error,
        "Error handling request"
    );
}

/// Credits the origin with a cancelled request unless disarmed before drop.
struct CancellationGuard<'a> {
    stats: &'a dyn OriginStatsTracker,
    app_id: &'a str,
    origin: &'a Origin,
    armed: bool,
}

impl<'a> CancellationGuard<'a> {
    fn new(stats: &'a dyn OriginStatsTracker, app_id: &'a str, origin: &'a Origin) -> Self {
        Self {
            stats,
            app_id,
            origin,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancellationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.stats.origin_stats(self.origin).request_cancelled();
            metrics::record_request_cancelled(self.app_id, &self.origin.id);
            tracing::debug!(app_id = %self.app_id, origin_id = %self.origin.id, "Request cancelled");
        }
    }
}

/// Builder for [`RequestDispatcher`].
pub struct DispatcherBuilder {
    config: Arc<BackendServiceConfig>,
    load_balancer: Arc<dyn LoadBalancer>,
    retry_policy: Arc<dyn RetryPolicy>,
    origin_stats: Arc<dyn OriginStatsTracker>,
    origins_restriction_cookie_name: Option<String>,
    origin_id_header: String,
    max_buffered_body: usize,
}

impl DispatcherBuilder {
    pub fn origin_stats(mut self, tracker: Arc<dyn OriginStatsTracker>) -> Self {
        self.origin_stats = tracker;
        self
    }

    /// Cookie consulted before the default sticky-session cookie.
    pub fn origins_restriction_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.origins_restriction_cookie_name = Some(name.into());
        self
    }

    pub fn origin_id_header(mut self, name: impl Into<String>) -> Self {
        self.origin_id_header = name.into();
        self
    }

    pub fn max_buffered_body(mut self, bytes: usize) -> Self {
        self.max_buffered_body = bytes;
        self
    }

    pub fn build(self) -> Result<RequestDispatcher, ConfigError> {
        let rewrite_ruleset = RewriteRuleset::from_config(self.config.rewrites()).map_err(|e| {
            ConfigError::Validation(vec![ValidationError::InvalidRewritePattern {
                pattern: e.to_string(),
                reason: "rewrite pattern failed to compile".to_string(),
            }])
        })?;

        let origin_id_header = HeaderName::from_bytes(self.origin_id_header.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(self.origin_id_header.clone()))?;

        Ok(RequestDispatcher {
            config: self.config,
            rewrite_ruleset,
            load_balancer: self.load_balancer,
            retry_policy: self.retry_policy,
            origin_stats: self.origin_stats,
            origins_restriction_cookie_name: self.origins_restriction_cookie_name,
            origin_id_header,
            max_buffered_body: self.max_buffered_body,
        })
    }
}
