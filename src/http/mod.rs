//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → tower layers (request id, trace, timeout, body limit)
//!     → handlers.rs
//!         /api/v1/identify → IdentificationService::identify → CombinedResult
//!         /health          → HealthReport::collect
//!     → JSON response (503 + Retry-After when nothing could answer)
//! ```
//!
//! # Design Decisions
//! - Images arrive as the raw request body; options as query parameters
//! - The service never returns an error; handlers only map results to status codes

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
