//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stderr (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Log output goes to stderr so command output on stdout stays parseable
//! - Metric calls are no-ops until an exporter is installed
//! - Private keys and passwords never appear in log fields

pub mod logging;
pub mod metrics;
