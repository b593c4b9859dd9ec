//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (response hardening, outermost)
//!     → cors.rs (origin admissibility, preflight)
//!     → auth.rs (optional bearer-token gate)
//!     → rate_limit.rs (per-client/per-route windows, from the handler)
//! ```
//!
//! # Design Decisions
//! - Ordering and short-circuit semantics are explicit in the server's
//!   layer stack, not implied by a framework pipeline
//! - Fail closed on offered-but-invalid credentials; absence of
//!   credentials is not a failure

pub mod auth;
pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use auth::{auth_gate, AuthPolicy, Claims};
pub use cors::{cors_enforcer, CorsPolicy};
pub use headers::{security_headers, HeaderPolicy};
pub use rate_limit::{apply_rate_headers, RateDecision, RateLimiter};
