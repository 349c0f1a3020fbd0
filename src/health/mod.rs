//! Service health derived from provider breaker states.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → HealthReport::collect(service)
//!     → snapshot each breaker (read-only, no transitions)
//!     → HealthStatus::from_states
//! ```
//!
//! # Design Decisions
//! - Health is reported, never probed: no active checks against providers
//! - An Open breaker past its cooldown still reads as Open until a request
//!   moves it on

pub mod report;

pub use report::{HealthReport, HealthStatus};
