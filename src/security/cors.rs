//! CORS enforcement.
//!
//! # Responsibilities
//! - Decide origin admissibility against an explicit allow-list
//! - Echo the allowed origin with credentials and the exposed
//!   rate-limit headers
//! - Answer preflight requests from allowed origins at the edge
//!
//! # Design Decisions
//! - No wildcard origins; the allow-list is exact strings
//! - Disallowed origins receive no CORS headers, but the request is
//!   still served; blocking is the browser's job
//! - `Vary: Origin` is always set alongside the echo so shared caches
//!   stay correct

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
    ORIGIN, VARY,
};
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::schema::CorsConfig;

const EXPOSED_HEADERS: &str = "X-RateLimit-Limit, X-RateLimit-Remaining, X-RateLimit-Reset";

/// Compiled origin allow-list.
#[derive(Debug)]
pub struct CorsPolicy {
    origins: HashSet<String>,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            origins: config.allowed_origins.iter().cloned().collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }
}

/// Middleware applying the CORS policy.
pub async fn cors_enforcer(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let allowed_origin = origin.filter(|o| policy.is_allowed(o));

    // Preflight from an allowed origin is answered at the edge; the
    // downstream never sees it.
    if request.method() == Method::OPTIONS {
        if let Some(origin) = &allowed_origin {
            if let Some(requested_method) = request.headers().get(ACCESS_CONTROL_REQUEST_METHOD) {
                let requested_headers =
                    request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();
                return preflight_response(origin, requested_method.clone(), requested_headers);
            }
        }
    }

    let mut response = next.run(request).await;

    if let Some(origin) = allowed_origin {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            let headers = response.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(EXPOSED_HEADERS),
            );
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
    }

    response
}

fn preflight_response(
    origin: &str,
    requested_method: HeaderValue,
    requested_headers: Option<HeaderValue>,
) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    // Any method and any requested headers are acceptable; the echo keeps
    // the response compatible with credentialed requests.
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, requested_method);
    if let Some(requested) = requested_headers {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested);
    }
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    headers.append(VARY, HeaderValue::from_static("Origin"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> Router {
        let policy = Arc::new(CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://app.example.com".into()],
        }));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(policy, cors_enforcer))
    }

    #[tokio::test]
    async fn allowed_origin_is_echoed_with_exposed_headers() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN.as_str()], "https://app.example.com");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS.as_str()], "true");
        assert_eq!(headers[ACCESS_CONTROL_EXPOSE_HEADERS.as_str()], EXPOSED_HEADERS);
    }

    #[tokio::test]
    async fn disallowed_origin_gets_no_cors_headers_but_is_served() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn preflight_is_answered_at_the_edge() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header(ORIGIN, "https://app.example.com")
                    .header(ACCESS_CONTROL_REQUEST_METHOD, "PUT")
                    .header(ACCESS_CONTROL_REQUEST_HEADERS, "content-type, x-custom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS.as_str()], "PUT");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS.as_str()], "content-type, x-custom");
    }

    #[tokio::test]
    async fn request_without_origin_passes_untouched() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
