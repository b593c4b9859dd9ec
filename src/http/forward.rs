//! Downstream request construction and dispatch.
//!
//! # Responsibilities
//! - Rewrite the inbound request for its downstream target
//! - Strip hop-by-hop headers, forward everything else untouched
//! - Dispatch with a per-call timeout and classify transport failures
//! - Relay the downstream response without buffering its body
//!
//! # Design Decisions
//! - Host is derived from the downstream authority, never forwarded
//! - The request body is passed through as-is; buffering for retries is
//!   the caller's decision

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::request::Parts;
use axum::http::uri::Scheme;
use axum::http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;
use crate::routing::router::RouteEntry;

/// Headers that describe the client connection, not the request; they
/// must not leak downstream.
const HOP_BY_HOP_HEADERS: &[&str] = &["connection", "keep-alive", "transfer-encoding", "upgrade"];

/// A downstream dispatch failure.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("downstream call timed out")]
    Timeout,

    #[error("downstream unreachable: {0}")]
    Unreachable(String),
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Timeout => GatewayError::DownstreamTimeout,
            ForwardError::Unreachable(detail) => GatewayError::DownstreamUnreachable(detail),
        }
    }
}

/// Shared downstream HTTP client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }

    /// Send one request, bounded by the route's per-call timeout. The
    /// in-flight call is dropped (and its connection released) if the
    /// caller is cancelled.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<Response<Incoming>, ForwardError> {
        match tokio::time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ForwardError::Unreachable(e.to_string())),
            Err(_) => Err(ForwardError::Timeout),
        }
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Build the downstream request for one attempt: same method, the
/// route's authority and path prefix, all headers except hop-by-hop and
/// Host, with the correlation id guaranteed present.
pub fn build_downstream_request(
    route: &RouteEntry,
    parts: &Parts,
    body: Body,
    request_id: &str,
) -> Result<Request<Body>, GatewayError> {
    let mut path_and_query = String::with_capacity(
        route.target.path_prefix.len() + parts.uri.path().len() + 1,
    );
    path_and_query.push_str(&route.target.path_prefix);
    path_and_query.push_str(parts.uri.path());
    if let Some(query) = parts.uri.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    let uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(route.target.authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::DownstreamUnreachable(e.to_string()))?;

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop(name) || name == HOST {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(X_REQUEST_ID, value);
        }
    }

    builder
        .body(body)
        .map_err(|e| GatewayError::DownstreamUnreachable(e.to_string()))
}

/// Relay a downstream response to the client verbatim. The body keeps
/// streaming; it is never collected at the gateway.
pub fn relay_response(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}
