//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: downstream assumed down, requests fail fast
//! - HalfOpen: one probe in flight, everything else still fails fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures reaches failure_threshold
//! Open → HalfOpen: break_duration elapsed since opened_at
//! HalfOpen → Closed: probe succeeds (failure count reset)
//! HalfOpen → Open: probe fails (opened_at reset)
//! ```
//!
//! # Design Decisions
//! - Per-route breaker, mutated under a per-route lock
//! - Exactly one probe while half-open; concurrent requests fail fast
//! - An abandoned probe is reclaimed after another break_duration so a
//!   dropped client cannot wedge the circuit

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::GatewayError;
use crate::routing::router::RouteEntry;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_started: Option<Instant>,
}

/// Permission to dispatch one request.
#[derive(Debug, Clone, Copy)]
pub struct CircuitPermit {
    /// True when this request is the half-open probe. Probes are never
    /// retried.
    pub probe: bool,
}

/// Circuit breaker for a single route.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    break_duration: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, break_duration: Duration) -> Self {
        Self {
            failure_threshold,
            break_duration,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_started: None,
            }),
        }
    }

    /// Ask to dispatch one request at `now`.
    pub fn try_acquire(&self, now: Instant) -> Result<CircuitPermit, GatewayError> {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");

        match inner.state {
            CircuitState::Closed => Ok(CircuitPermit { probe: false }),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                if now.duration_since(opened_at) >= self.break_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started = Some(now);
                    tracing::info!("Circuit half-open, probing downstream");
                    Ok(CircuitPermit { probe: true })
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                let stale = inner
                    .probe_started
                    .map_or(true, |started| now.duration_since(started) >= self.break_duration);
                if stale {
                    inner.probe_started = Some(now);
                    Ok(CircuitPermit { probe: true })
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
        }
    }

    /// Record a successful dispatch.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");

        match inner.state {
            CircuitState::Closed | CircuitState::Open => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_started = None;
                tracing::info!("Circuit closed after successful probe");
            }
        }
    }

    /// Record a failed dispatch (all retries exhausted count as one).
    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "Circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.probe_started = None;
                tracing::warn!("Circuit reopened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker lock poisoned").state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner
            .lock()
            .expect("circuit breaker lock poisoned")
            .consecutive_failures
    }
}

/// Per-route breakers, built once from the route table.
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    breakers: HashMap<String, CircuitBreaker>,
}

impl CircuitRegistry {
    pub fn from_routes(routes: &[RouteEntry]) -> Self {
        let breakers = routes
            .iter()
            .map(|route| {
                (
                    route.name.clone(),
                    CircuitBreaker::new(
                        route.resilience.failure_threshold,
                        route.resilience.break_duration,
                    ),
                )
            })
            .collect();
        Self { breakers }
    }

    pub fn get(&self, route: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_secs(10))
    }

    #[test]
    fn starts_closed() {
        let cb = breaker();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire(Instant::now()).is_ok());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker();
        let now = Instant::now();

        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure(now);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.try_acquire(now), Err(GatewayError::CircuitOpen)));
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker();
        let now = Instant::now();

        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.failure_count(), 2);

        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn single_probe_after_break_duration() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }

        // Still inside the break window.
        assert!(cb.try_acquire(now + Duration::from_secs(9)).is_err());

        // First caller after the window becomes the probe.
        let later = now + Duration::from_secs(10);
        let permit = cb.try_acquire(later).unwrap();
        assert!(permit.probe);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Concurrent requests are still fast-failed.
        assert!(cb.try_acquire(later).is_err());
        assert!(cb.try_acquire(later + Duration::from_secs(1)).is_err());
    }

    #[test]
    fn probe_success_closes() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        let later = now + Duration::from_secs(10);
        cb.try_acquire(later).unwrap();

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.try_acquire(later).is_ok());
    }

    #[test]
    fn probe_failure_reopens_with_fresh_window() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        let probe_at = now + Duration::from_secs(10);
        cb.try_acquire(probe_at).unwrap();

        cb.record_failure(probe_at + Duration::from_secs(1));
        assert_eq!(cb.state(), CircuitState::Open);

        // opened_at was reset by the probe failure.
        assert!(cb.try_acquire(probe_at + Duration::from_secs(10)).is_err());
        assert!(cb.try_acquire(probe_at + Duration::from_secs(11)).is_ok());
    }

    #[test]
    fn abandoned_probe_is_reclaimed() {
        let cb = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure(now);
        }
        let probe_at = now + Duration::from_secs(10);
        cb.try_acquire(probe_at).unwrap();
        // The probe never reports back. After another break_duration a new
        // probe is admitted.
        let permit = cb.try_acquire(probe_at + Duration::from_secs(10)).unwrap();
        assert!(permit.probe);
    }
}
