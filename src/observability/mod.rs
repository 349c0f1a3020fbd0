//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every breaker transition is both logged and counted
//! - Request IDs come from the HTTP layer and ride on tracing spans
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
