//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to downstream:
//!     → circuit_breaker.rs (acquire permit or fail fast)
//!     → dispatch with per-call timeout
//!     → on failure: retries.rs decides eligibility,
//!       backoff.rs spaces the attempts
//!     → final outcome recorded back into the breaker
//! ```
//!
//! # Design Decisions
//! - All retry attempts of one request count as a single circuit failure
//! - Timeouts, connection errors and downstream 5xx all count as failures
//! - 4xx responses are relayed and never counted (client error, not
//!   downstream health)

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use backoff::calculate_backoff;
pub use circuit_breaker::{CircuitBreaker, CircuitPermit, CircuitRegistry, CircuitState};
pub use retries::is_retry_safe;
