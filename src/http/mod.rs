//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware chain)
//!     → request.rs (correlation id)
//!     → [security layers decide admissibility]
//!     → context.rs (per-request value bag)
//!     → forward.rs (downstream rewrite + dispatch)
//!     → response relayed to client
//! ```

pub mod context;
pub mod forward;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::HttpServer;
