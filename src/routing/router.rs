//! Route table: compiled routes and lookup.
//!
//! # Responsibilities
//! - Compile route configuration into immutable entries
//! - Look up the matching route for (method, path)
//! - Return the matched entry plus resolved placeholders
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Unparsable entries are logged and skipped at compile time;
//!   validation reports them before this point on the normal path

use std::time::Duration;

use axum::http::uri::Authority;
use axum::http::Method;
use url::Url;

use crate::config::schema::RouteConfig;
use crate::routing::matcher::TemplateTrie;

/// Where a route forwards to.
#[derive(Debug, Clone)]
pub struct DownstreamTarget {
    /// host:port of the downstream service.
    pub authority: Authority,
    /// Path prefix from the configured base URL, "" when the base URL has
    /// no path. Prepended to the inbound request path.
    pub path_prefix: String,
}

/// Per-route fixed-window rate limit.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

/// Per-route retry and circuit-breaker policy.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub failure_threshold: u32,
    pub break_duration: Duration,
    pub timeout: Duration,
}

/// A compiled route. Read-only after load.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    pub template: String,
    pub methods: Vec<Method>,
    pub target: DownstreamTarget,
    pub auth_required: bool,
    pub idempotent: bool,
    pub rate_limit: RateLimitPolicy,
    pub resilience: ResiliencePolicy,
}

/// A successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteEntry,
    /// Placeholder values resolved during matching, in template order.
    pub params: Vec<(String, String)>,
}

/// Immutable routing table, built once at startup.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    trie: TemplateTrie,
}

impl RouteTable {
    /// Compile the configured routes. Entries that fail to compile are
    /// logged and skipped.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut entries = Vec::with_capacity(configs.len());
        let mut trie = TemplateTrie::new();

        for config in configs {
            match compile_route(config) {
                Ok(entry) => {
                    tracing::info!(
                        route = %entry.name,
                        template = %entry.template,
                        downstream = %entry.target.authority,
                        auth_required = entry.auth_required,
                        "Route registered"
                    );
                    trie.insert(&entry.template, entries.len());
                    entries.push(entry);
                }
                Err(reason) => {
                    tracing::warn!(route = %config.name, reason = %reason, "Skipping invalid route");
                }
            }
        }

        Self { entries, trie }
    }

    /// Find the route for a method and path. Most specific template wins;
    /// a template whose method list does not include `method` does not
    /// match at all.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.trie
            .matches(path)
            .into_iter()
            .find(|m| self.entries[m.route_index].methods.contains(method))
            .map(|m| RouteMatch {
                route: &self.entries[m.route_index],
                params: m.params,
            })
    }

    /// All compiled routes, in declaration order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

fn compile_route(config: &RouteConfig) -> Result<RouteEntry, String> {
    let mut methods = Vec::with_capacity(config.methods.len());
    for method in &config.methods {
        methods.push(
            Method::from_bytes(method.as_bytes())
                .map_err(|_| format!("unknown HTTP method: {}", method))?,
        );
    }

    let url = Url::parse(&config.downstream_base_url)
        .map_err(|e| format!("invalid downstream base URL: {}", e))?;
    let host = url.host_str().ok_or("downstream base URL has no host")?;
    let authority_str = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let authority: Authority = authority_str
        .parse()
        .map_err(|_| format!("invalid downstream authority: {}", authority_str))?;

    let path_prefix = url.path().trim_end_matches('/').to_string();

    Ok(RouteEntry {
        name: config.name.clone(),
        template: config.upstream_path_template.clone(),
        methods,
        target: DownstreamTarget { authority, path_prefix },
        auth_required: config.auth_required,
        idempotent: config.idempotent,
        rate_limit: RateLimitPolicy {
            limit: config.rate_limit.limit,
            window: Duration::from_secs(config.rate_limit.window_secs),
        },
        resilience: ResiliencePolicy {
            max_retries: config.resilience.max_retries,
            backoff_base_ms: config.resilience.backoff_base_ms,
            backoff_max_ms: config.resilience.backoff_max_ms,
            failure_threshold: config.resilience.failure_threshold,
            break_duration: Duration::from_secs(config.resilience.break_duration_secs),
            timeout: Duration::from_millis(config.resilience.timeout_ms),
        },
    })
}
