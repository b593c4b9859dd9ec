//! HTTP server assembly and the request pipeline.
//!
//! # Responsibilities
//! - Build the Axum router with the explicit middleware chain:
//!   trace → concurrency limit → request id → security headers → CORS →
//!   request timeout → auth gate → handler
//! - Handler: route match → rate limit → circuit breaker → forward
//! - Relay downstream responses, attaching the gateway-owned headers
//!
//! # Design Decisions
//! - Ordering and short-circuit behavior live here, in one place
//! - Per-route policies (rate limit, resilience) run inside the handler
//!   because they need the matched route
//! - All retry attempts of one request count as a single circuit failure

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, State},
    http::{header::CONTENT_LENGTH, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::GatewayConfig;
use crate::error::GatewayError;
use crate::http::context::{client_identity, RequestContext};
use crate::http::forward::{build_downstream_request, relay_response, Forwarder};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitPermit, CircuitRegistry};
use crate::resilience::retries::is_retry_safe;
use crate::routing::router::{RouteEntry, RouteTable};
use crate::security::auth::{auth_gate, AuthPolicy, Claims};
use crate::security::cors::{cors_enforcer, CorsPolicy};
use crate::security::headers::{security_headers, HeaderPolicy};
use crate::security::rate_limit::{apply_rate_headers, RateDecision, RateLimiter};

/// Retry-eligible request bodies are buffered up to this size so every
/// attempt can resend them. Larger bodies stream through with retries
/// disabled for that request.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub circuits: Arc<CircuitRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub forwarder: Forwarder,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server from validated configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let routes = Arc::new(RouteTable::from_config(&config.routes));
        let circuits = Arc::new(CircuitRegistry::from_routes(routes.entries()));

        let state = AppState {
            routes,
            circuits,
            rate_limiter: Arc::new(RateLimiter::new()),
            forwarder: Forwarder::new(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router. Later layers wrap earlier ones, so the
    /// stack reads bottom-up: trace outermost, auth gate closest to the
    /// handler.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let auth = Arc::new(AuthPolicy::from_config(config.auth.as_ref()));
        let cors = Arc::new(CorsPolicy::from_config(&config.cors));
        let headers = Arc::new(HeaderPolicy {
            hsts: config.listener.tls.is_some(),
        });

        Router::new()
            .route("/healthz", get(health))
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(auth, auth_gate))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(middleware::from_fn_with_state(cors, cors_enforcer))
            .layer(middleware::from_fn_with_state(headers, security_headers))
            .layer(RequestIdLayer)
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on a plain TCP listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination.
    pub async fn run_tls(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let tls = self.config.listener.tls.clone().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "TLS is not configured")
        })?;
        let addr: SocketAddr = self.config.listener.bind_address.parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address: {}", e),
            )
        })?;

        let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(30)));
        });

        tracing::info!(address = %addr, "HTTP server starting (TLS)");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Gateway-owned liveness endpoint; never routed downstream.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Main gateway handler: route match → rate limit → resilience → forward.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(matched) = state.routes.match_route(&method, &path) else {
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, "none", start);
        return GatewayError::RouteNotFound.into_response();
    };
    let route = matched.route;

    let ctx = RequestContext {
        request_id,
        client_id: client_identity(request.extensions().get::<Claims>(), &peer),
        route: route.name.clone(),
        params: matched.params,
    };

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %method,
        path = %path,
        route = %ctx.route,
        client = %ctx.client_id,
        "Proxying request"
    );

    let (limit, remaining, reset_secs) = match state.rate_limiter.check(
        &ctx.client_id,
        &route.name,
        &route.rate_limit,
        Instant::now(),
    ) {
        RateDecision::Limited { limit, reset_secs } => {
            tracing::warn!(
                request_id = %ctx.request_id,
                client = %ctx.client_id,
                route = %ctx.route,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(&route.name);
            metrics::record_request(method.as_str(), 429, &route.name, start);
            return GatewayError::RateLimitExceeded { limit, reset_secs }.into_response();
        }
        RateDecision::Allowed { limit, remaining, reset_secs } => (limit, remaining, reset_secs),
    };

    let Some(breaker) = state.circuits.get(&route.name) else {
        // Registry is built from the same route table; a miss would be a
        // construction bug. Fail safe rather than forward unguarded.
        tracing::error!(route = %ctx.route, "No circuit breaker registered for route");
        return GatewayError::CircuitOpen.into_response();
    };

    let mut response = match breaker.try_acquire(Instant::now()) {
        Ok(permit) => forward_with_resilience(&state, route, breaker, permit, &ctx, request).await,
        Err(e) => {
            tracing::debug!(request_id = %ctx.request_id, route = %ctx.route, "Circuit open, failing fast");
            metrics::record_circuit_open(&route.name);
            e.into_response()
        }
    };

    apply_rate_headers(response.headers_mut(), limit, remaining, reset_secs);
    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        &route.name,
        start,
    );
    response
}

/// Dispatch downstream under the route's resilience policy. Returns the
/// relayed response or a gateway-owned error response.
async fn forward_with_resilience(
    state: &AppState,
    route: &RouteEntry,
    breaker: &CircuitBreaker,
    permit: CircuitPermit,
    ctx: &RequestContext,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();

    // Probes are never retried; otherwise retry eligibility is decided by
    // method/route, and the body must be small enough to replay.
    let declared_length = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let want_retries = !permit.probe
        && route.resilience.max_retries > 0
        && is_retry_safe(&parts.method, route.idempotent)
        && declared_length <= MAX_BUFFERED_BODY;

    let (buffered, mut streamed) = if want_retries {
        match to_bytes(body, MAX_BUFFERED_BODY).await {
            Ok(bytes) => (Some(bytes), None),
            Err(e) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "Failed to read request body"
                );
                return (StatusCode::BAD_REQUEST, "request body could not be read")
                    .into_response();
            }
        }
    } else {
        (None, Some(body))
    };

    let max_attempts = if buffered.is_some() {
        route.resilience.max_retries + 1
    } else {
        1
    };

    let mut attempt = 0;
    loop {
        attempt += 1;

        let attempt_body = match (&buffered, streamed.take()) {
            (Some(bytes), _) => Body::from(bytes.clone()),
            (None, Some(body)) => body,
            // Streamed bodies are dispatched exactly once.
            (None, None) => Body::empty(),
        };

        let downstream = match build_downstream_request(route, &parts, attempt_body, &ctx.request_id)
        {
            Ok(req) => req,
            Err(e) => return e.into_response(),
        };

        match state.forwarder.dispatch(downstream, route.resilience.timeout).await {
            Ok(response) if !response.status().is_server_error() => {
                breaker.record_success();
                return relay_response(response);
            }
            Ok(response) => {
                // Downstream 5xx: counted against the circuit after
                // retries, then relayed verbatim.
                if attempt < max_attempts {
                    retry_pause(ctx, route, attempt, &format!("status {}", response.status()))
                        .await;
                    continue;
                }
                breaker.record_failure(Instant::now());
                return relay_response(response);
            }
            Err(err) => {
                if attempt < max_attempts {
                    retry_pause(ctx, route, attempt, &err.to_string()).await;
                    continue;
                }
                breaker.record_failure(Instant::now());
                tracing::error!(
                    request_id = %ctx.request_id,
                    route = %ctx.route,
                    attempts = attempt,
                    error = %err,
                    "Downstream call failed"
                );
                return GatewayError::from(err).into_response();
            }
        }
    }
}

async fn retry_pause(ctx: &RequestContext, route: &RouteEntry, attempt: u32, reason: &str) {
    let delay = calculate_backoff(
        attempt,
        route.resilience.backoff_base_ms,
        route.resilience.backoff_max_ms,
    );
    tracing::info!(
        request_id = %ctx.request_id,
        route = %ctx.route,
        attempt,
        delay = ?delay,
        reason = %reason,
        "Retrying downstream call"
    );
    metrics::record_retry(&ctx.route);
    tokio::time::sleep(delay).await;
}
