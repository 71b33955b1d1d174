//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms, per-handler stats)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Admin API (/admin/stats)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log lines of a request via TraceLayer
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
