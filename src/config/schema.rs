//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from
//! config files. The configuration is loaded once at startup and is
//! immutable for the process lifetime.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Ordered route definitions mapping upstream templates to downstream
    /// services. Declaration order breaks specificity ties.
    pub routes: Vec<RouteConfig>,

    /// Bearer-token validation settings. When absent, any request that
    /// carries an `Authorization` header is rejected.
    pub auth: Option<AuthConfig>,

    /// CORS origin allow-list.
    pub cors: CorsConfig,

    /// Whole-request timeout.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration. Presence also enables the
    /// Strict-Transport-Security response header.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// A single route: upstream template, allowed methods, downstream target
/// and the policies applied to traffic on this route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics and rate-bucket keys.
    pub name: String,

    /// Upstream path template. Exact segments plus `{named}` placeholders,
    /// e.g. "/api/users/{id}".
    pub upstream_path_template: String,

    /// Allowed HTTP methods for this route.
    pub methods: Vec<String>,

    /// Downstream base URL, e.g. "http://127.0.0.1:9001/api".
    pub downstream_base_url: String,

    /// Whether callers are expected to present credentials. Anonymous
    /// requests still pass (tokens are validated only when offered);
    /// the flag documents intent and is surfaced in logs.
    #[serde(default = "default_true")]
    pub auth_required: bool,

    /// Marks a non-GET route as safe to retry.
    #[serde(default)]
    pub idempotent: bool,

    /// Per-route rate limit policy.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-route resilience policy.
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

fn default_true() -> bool {
    true
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per client per window.
    pub limit: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_secs: 60,
        }
    }
}

/// Retry and circuit-breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Maximum number of retry attempts for idempotent requests.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub backoff_max_ms: u64,

    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed,
    /// in seconds.
    pub break_duration_secs: u64,

    /// Per-call downstream timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 100,
            backoff_max_ms: 2000,
            failure_threshold: 5,
            break_duration_secs: 30,
            timeout_ms: 5000,
        }
    }
}

/// Bearer-token validation settings. HS256, issuer, audience and expiry
/// are all required with zero clock-skew tolerance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// HMAC signing key shared with the token issuer.
    pub signing_key: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Explicit origin allow-list. No wildcard support.
    pub allowed_origins: Vec<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout (client edge to relayed response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
