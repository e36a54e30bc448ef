//! Sticky sessions and origin preference.
//!
//! # Responsibilities
//! - Read the origin-pinning cookie from a request
//! - Build the sticky-session `Set-Cookie` for a response
//!
//! # Cookie resolution
//! ```text
//! restriction cookie configured?
//!     yes → <restriction name>, else styx_origin_<app id>
//!     no  → styx_origin_<app id>
//! ```

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response};

/// Prefix of the per-application sticky-session cookie.
pub const STICKY_COOKIE_PREFIX: &str = "styx_origin_";

/// Name of the sticky-session cookie for an application.
pub fn sticky_cookie_name(app_id: &str) -> String {
    format!("{}{}", STICKY_COOKIE_PREFIX, app_id)
}

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
}

/// Origin id the request asks to be pinned to, if any.
pub fn preferred_origin(
    headers: &HeaderMap,
    app_id: &str,
    restriction_cookie_name: Option<&str>,
) -> Option<String> {
    restriction_cookie_name
        .and_then(|name| request_cookie(headers, name))
        .or_else(|| request_cookie(headers, &sticky_cookie_name(app_id)))
}

/// `Set-Cookie` value pinning the client to `origin_id` for `max_age_secs`.
pub fn sticky_session_cookie(app_id: &str, origin_id: &str, max_age_secs: u64) -> Option<HeaderValue> {
    let cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly",
        sticky_cookie_name(app_id),
        origin_id,
        max_age_secs
    );
    HeaderValue::from_str(&cookie).ok()
}

/// Append the sticky-session cookie, keeping any cookies the origin set.
pub fn add_sticky_session_cookie(
    mut response: Response<Body>,
    app_id: &str,
    origin_id: &str,
    max_age_secs: u64,
) -> Response<Body> {
    match sticky_session_cookie(app_id, origin_id, max_age_secs) {
        Some(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        None => {
            tracing::warn!(app_id = %app_id, origin_id = %origin_id, "Cannot encode sticky session cookie");
        }
    }
    response
}
