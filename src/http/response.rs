//! Response sanitization.
//!
//! # Responsibilities
//! - Strip bodies the client must not receive (HEAD requests, bodiless statuses)
//! - Drop a `Content-Length` that contradicts chunked framing
//! - Stamp the serving origin's id on the response
//!
//! # Design Decisions
//! - Every step is a pure function over the response and cannot fail
//! - Steps are idempotent; sanitizing twice equals sanitizing once

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Response, StatusCode};

/// Default header naming the origin that served a response.
pub const DEFAULT_ORIGIN_ID_HEADER: &str = "x-styx-origin-id";

/// Statuses that never carry a body.
pub fn is_bodiless_status(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || status.is_informational()
}

/// True when the response uses chunked transfer coding.
pub fn is_chunked(response: &Response<Body>) -> bool {
    response
        .headers()
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Replace the body with an empty one and advertise `Content-Length: 0`
/// when the request was HEAD or the status is bodiless.
pub fn remove_unexpected_body(method: &Method, response: Response<Body>) -> Response<Body> {
    if *method != Method::HEAD && !is_bodiless_status(response.status()) {
        return response;
    }

    let (mut parts, _body) = response.into_parts();
    parts.headers.remove(header::TRANSFER_ENCODING);
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    Response::from_parts(parts, Body::empty())
}

/// Chunked framing wins over an explicit length.
pub fn remove_redundant_content_length(mut response: Response<Body>) -> Response<Body> {
    if is_chunked(&response) && response.headers().contains_key(header::CONTENT_LENGTH) {
        response.headers_mut().remove(header::CONTENT_LENGTH);
    }
    response
}

/// Run the full sanitization pipeline, in order.
pub fn sanitize(method: &Method, response: Response<Body>) -> Response<Body> {
    let response = remove_unexpected_body(method, response);
    remove_redundant_content_length(response)
}

/// Set the origin-id header, replacing any value the origin sent.
pub fn add_origin_id(
    header_name: &HeaderName,
    origin_id: &str,
    mut response: Response<Body>,
) -> Response<Body> {
    match HeaderValue::from_str(origin_id) {
        Ok(value) => {
            response.headers_mut().insert(header_name.clone(), value);
        }
        Err(e) => {
            tracing::warn!(origin_id = %origin_id, error = %e, "Origin id is not a valid header value");
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_bytes(response: Response<Body>) -> axum::body::Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    fn response(status: u16, body: &'static str) -> Response<Body> {
        Response::builder()
            .status(status)
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    fn chunked_response(status: u16, body: &'static str) -> Response<Body> {
        Response::builder()
            .status(status)
            .header(header::TRANSFER_ENCODING, "chunked")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_bodiless_statuses() {
        assert!(is_bodiless_status(StatusCode::NO_CONTENT));
        assert!(is_bodiless_status(StatusCode::NOT_MODIFIED));
        assert!(is_bodiless_status(StatusCode::CONTINUE));
        assert!(is_bodiless_status(StatusCode::SWITCHING_PROTOCOLS));
        assert!(!is_bodiless_status(StatusCode::OK));
        assert!(!is_bodiless_status(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_head_request_body_stripped() {
        let sanitized = sanitize(&Method::HEAD, chunked_response(200, "hello"));
        assert_eq!(sanitized.status(), StatusCode::OK);
        assert!(sanitized.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(sanitized.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
        assert!(body_bytes(sanitized).await.is_empty());
    }

    #[tokio::test]
    async fn test_bodiless_status_sanitize_is_idempotent() {
        for status in [204, 304, 100] {
            let once = sanitize(&Method::GET, chunked_response(status, "unexpected"));
            let once_headers = once.headers().clone();
            let twice = sanitize(&Method::GET, once);

            assert_eq!(twice.headers(), &once_headers);
            assert_eq!(twice.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
            assert!(body_bytes(twice).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_get_with_body_untouched() {
        let sanitized = sanitize(&Method::GET, response(200, "hello"));
        assert_eq!(sanitized.headers().get(header::CONTENT_LENGTH).unwrap(), "5");
        assert_eq!(body_bytes(sanitized).await, "hello");
    }

    #[test]
    fn test_chunked_drops_content_length() {
        let sanitized = sanitize(&Method::GET, chunked_response(200, "hello"));
        assert!(sanitized.headers().get(header::CONTENT_LENGTH).is_none());
        assert!(is_chunked(&sanitized));
    }

    #[test]
    fn test_chunked_detection_handles_coding_lists() {
        let response = Response::builder()
            .header(header::TRANSFER_ENCODING, "gzip, Chunked")
            .body(Body::empty())
            .unwrap();
        assert!(is_chunked(&response));
    }

    #[test]
    fn test_add_origin_id_overwrites() {
        let name = HeaderName::from_static(DEFAULT_ORIGIN_ID_HEADER);
        let response = Response::builder()
            .header(DEFAULT_ORIGIN_ID_HEADER, "spoofed")
            .body(Body::empty())
            .unwrap();
        let response = add_origin_id(&name, "shop-01", response);
        let values: Vec<_> = response.headers().get_all(&name).iter().collect();
        assert_eq!(values, vec!["shop-01"]);
    }
}
