//! Fixed-window rate limiting.
//!
//! # Responsibilities
//! - Track request counts per (client, route) in fixed windows
//! - Decide allow/limit and compute the X-RateLimit-* header values
//!
//! # Design Decisions
//! - Sharded map keyed by (client, route); entries are mutated under the
//!   shard lock, so increments are never lost
//! - No cross-route or cross-client synchronization
//! - Rejected requests do not consume budget

use std::time::{Duration, Instant};

use axum::http::header::HeaderValue;
use axum::http::HeaderMap;
use dashmap::DashMap;

use crate::routing::router::RateLimitPolicy;

/// One client's counter for one route.
#[derive(Debug)]
struct RateBucket {
    count: u32,
    window_start: Instant,
}

/// The limiter's verdict for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { limit: u32, remaining: u32, reset_secs: u64 },
    Limited { limit: u32, reset_secs: u64 },
}

/// Shared rate-limit state across all routes.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<(String, String), RateBucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the policy for one request. `now` is injected so window
    /// arithmetic is testable.
    pub fn check(
        &self,
        client_id: &str,
        route: &str,
        policy: &RateLimitPolicy,
        now: Instant,
    ) -> RateDecision {
        let key = (client_id.to_string(), route.to_string());
        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| RateBucket { count: 0, window_start: now });

        if now.duration_since(bucket.window_start) >= policy.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        let reset_secs = ceil_secs(
            (bucket.window_start + policy.window).saturating_duration_since(now),
        );

        if bucket.count >= policy.limit {
            RateDecision::Limited { limit: policy.limit, reset_secs }
        } else {
            bucket.count += 1;
            RateDecision::Allowed {
                limit: policy.limit,
                remaining: policy.limit - bucket.count,
                reset_secs,
            }
        }
    }
}

/// Seconds until the window ends, rounded up so a client sleeping this
/// long always lands in a fresh window.
fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Write the X-RateLimit-* headers for an allowed request.
pub fn apply_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_secs: u64) {
    if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&reset_secs.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}
