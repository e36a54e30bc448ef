//! Request identity and per-request interceptor context.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Carry caller context alongside the request into origin clients
//! - Propagate the request ID to origins via `x-request-id`

use axum::http::{HeaderMap, HeaderValue};
use std::fmt;
use std::net::SocketAddr;
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Context handed by the caller to the dispatcher and on to origin clients.
#[derive(Debug, Clone, Default)]
pub struct InterceptorContext {
    request_id: RequestId,
    client_addr: Option<SocketAddr>,
}

impl InterceptorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Set `x-request-id` unless the request already carries one.
    pub fn propagate_request_id(&self, headers: &mut HeaderMap) {
        if headers.contains_key(X_REQUEST_ID) {
            return;
        }
        if let Ok(value) = HeaderValue::from_str(&self.request_id.to_string()) {
            headers.insert(X_REQUEST_ID, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_propagate_sets_missing_header() {
        let ctx = InterceptorContext::new();
        let mut headers = HeaderMap::new();
        ctx.propagate_request_id(&mut headers);
        assert_eq!(
            headers.get(X_REQUEST_ID).unwrap().to_str().unwrap(),
            ctx.request_id().to_string()
        );
    }

    #[test]
    fn test_client_addr_carried() {
        let addr: SocketAddr = "192.0.2.7:51000".parse().unwrap();
        let ctx = InterceptorContext::new().with_client_addr(addr);
        assert_eq!(ctx.client_addr(), Some(addr));
        assert_eq!(InterceptorContext::new().client_addr(), None);
    }

    #[test]
    fn test_propagate_keeps_existing_header() {
        let ctx = InterceptorContext::new();
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("upstream-id"));
        ctx.propagate_request_id(&mut headers);
        assert_eq!(headers.get(X_REQUEST_ID).unwrap(), "upstream-id");
    }
}
