//! Retry eligibility.
//!
//! # Design Decisions
//! - Only idempotent work is retried: GET/HEAD, or routes explicitly
//!   marked idempotent in configuration
//! - POST/PUT/PATCH/DELETE are never retried automatically; a duplicate
//!   side effect downstream is worse than a failed request
//! - Half-open probes are never retried regardless of method

use axum::http::Method;

/// Whether a request on this route may be retried after a failure.
pub fn is_retry_safe(method: &Method, route_idempotent: bool) -> bool {
    matches!(*method, Method::GET | Method::HEAD) || route_idempotent
}
