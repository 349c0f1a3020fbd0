//! Plant identification gateway library.
//!
//! Fronts two third-party identification APIs (Plant.id and PlantNet), each
//! behind its own circuit breaker, and merges their answers.

// Core flow
pub mod cache;
pub mod identification;
pub mod providers;
pub mod resilience;

// Surfaces
pub mod health;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use identification::{CombinedResult, IdentificationService};
pub use lifecycle::Shutdown;
