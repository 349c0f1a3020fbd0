//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider call:
//!     → circuit_breaker.rs (admit or fail fast)
//!     → provider client (HTTP request with its own timeout)
//!     → circuit_breaker.rs (record success / classified failure)
//! ```
//!
//! # Design Decisions
//! - Timeouts live in the HTTP client; every provider call has a deadline
//! - No retries: a failed provider is skipped for the current request
//! - Only infrastructure failures count toward opening a breaker

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerConfig, BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
