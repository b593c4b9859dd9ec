//! Gateway error taxonomy.
//!
//! Every terminal condition the gateway owns maps to a deterministic
//! status code and a small JSON body. Downstream 5xx responses are not
//! represented here: they are relayed to the client verbatim.

use axum::http::{header::HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("no route matched the request")]
    RouteNotFound,

    #[error("authorization token rejected")]
    AuthRejected,

    #[error("rate limit exceeded")]
    RateLimitExceeded { limit: u32, reset_secs: u64 },

    #[error("circuit open")]
    CircuitOpen,

    #[error("downstream call timed out")]
    DownstreamTimeout,

    #[error("downstream unreachable: {0}")]
    DownstreamUnreachable(String),
}

impl GatewayError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::AuthRejected => StatusCode::UNAUTHORIZED,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            Self::DownstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::DownstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::RouteNotFound => "route_not_found",
            Self::AuthRejected => "auth_rejected",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::CircuitOpen => "circuit_open",
            Self::DownstreamTimeout => "downstream_timeout",
            Self::DownstreamUnreachable(_) => "downstream_unreachable",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Sanitised message: never expose backend addresses or transport
        // error detail to clients.
        let message = match &self {
            Self::RouteNotFound => "no route matched the request",
            Self::AuthRejected => "authorization token rejected",
            Self::RateLimitExceeded { .. } => "rate limit exceeded",
            Self::CircuitOpen => "service temporarily unavailable",
            Self::DownstreamTimeout => "downstream request timed out",
            Self::DownstreamUnreachable(_) => "downstream service unreachable",
        };

        let mut response =
            (status, Json(serde_json::json!({ "error": message }))).into_response();

        if let Self::RateLimitExceeded { limit, reset_secs } = self {
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("X-RateLimit-Limit", v);
            }
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            if let Ok(v) = HeaderValue::from_str(&reset_secs.to_string()) {
                headers.insert("X-RateLimit-Reset", v);
            }
        }

        response
    }
}
