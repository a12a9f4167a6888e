//! Pure helper functions for authentication
//!
//! Cookie extraction and construction, secure-transport detection and the
//! HTTP client used to talk to the identity provider.

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue, Uri};
use std::time::Duration;

use super::error::AuthError;

// =============================================================================
// HTTP Client Builders
// =============================================================================

/// Create a reqwest client for identity provider requests using config timeouts
pub fn create_http_client(
    connect_timeout_secs: u64,
    request_timeout_secs: u64,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none()) // Security: prevent SSRF
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .build()
}

// =============================================================================
// Transport
// =============================================================================

/// Whether the request reached us over TLS, directly or via a reverse proxy.
///
/// Decides the cookie `Secure` attribute on its own, independent of
/// `ENVIRONMENT`: a plain-HTTP deployment must still get a usable cookie.
pub fn is_secure_transport(uri: &Uri, headers: &HeaderMap) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }

    let header_is = |name: &str, expected: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    };

    header_is("x-forwarded-proto", "https") || header_is("x-forwarded-ssl", "on")
}

// =============================================================================
// Cookies
// =============================================================================

/// Extract a cookie value from headers
///
/// Handles multiple Cookie headers (some proxies fold/duplicate headers).
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);

    for header_value in headers.get_all("cookie") {
        if let Ok(cookie_str) = header_value.to_str() {
            if let Some(value) = cookie_str
                .split(';')
                .map(|c| c.trim())
                .find(|c| c.starts_with(&prefix))
                .and_then(|c| c.strip_prefix(&prefix))
            {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Build the session cookie. Never readable from page scripts.
pub fn session_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax{}",
        name,
        value,
        max_age_secs,
        if secure { "; Secure" } else { "" }
    )
}

/// Build a cookie that expires the session cookie immediately.
pub fn clear_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

/// Create a HeaderValue from a string.
/// This prevents panics from malformed cookie values.
pub fn header_value(s: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(s).map_err(|e: InvalidHeaderValue| {
        tracing::error!(
            error = %e,
            value_len = s.len(),
            "Failed to create header value"
        );
        AuthError::Internal("Internal error setting response headers".to_string())
    })
}

// =============================================================================
// Tests
// =============================================================================
