//! Security response headers.
//!
//! # Responsibilities
//! - Add the fixed security headers to every response, success or error
//! - Remove any `Server` header before the response leaves the gateway
//! - Add Strict-Transport-Security when the listener terminates TLS
//!
//! # Design Decisions
//! - Runs as the outermost policy layer so short-circuit responses
//!   (401, 404, 429, 503) are covered too
//! - Headers are overwritten, not appended; downstream values never win

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    HeaderValue, REFERRER_POLICY, SERVER, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Static policy for the header injector.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    /// Whether to emit Strict-Transport-Security. Set when the inbound
    /// listener terminates TLS.
    pub hsts: bool,
}

/// Middleware adding the fixed security headers to every response.
pub async fn security_headers(
    State(policy): State<Arc<HeaderPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.remove(SERVER);

    if policy.hsts {
        headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
