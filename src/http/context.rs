//! Per-request context.

use std::net::SocketAddr;

use crate::security::auth::Claims;

/// Everything the pipeline knows about one request. Created after route
/// matching, dropped when the response is sent; owned exclusively by the
/// handling task.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, generated or propagated at the edge.
    pub request_id: String,
    /// Authenticated subject when a token was presented, client IP
    /// otherwise. Keys the rate-limit buckets.
    pub client_id: String,
    /// Name of the matched route.
    pub route: String,
    /// Placeholder values resolved during matching.
    pub params: Vec<(String, String)>,
}

/// Derive the rate-limit identity: token subject when authenticated,
/// peer IP otherwise.
pub fn client_identity(claims: Option<&Claims>, peer: &SocketAddr) -> String {
    match claims {
        Some(claims) => claims.sub.clone(),
        None => peer.ip().to_string(),
    }
}
