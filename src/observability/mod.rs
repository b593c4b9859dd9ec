//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     logging.rs → tracing subscriber (EnvFilter + fmt)
//!     metrics.rs → Prometheus exporter on its own listener
//!
//! Per request:
//!     handler → metrics.rs counters/histograms
//! ```

pub mod logging;
pub mod metrics;
