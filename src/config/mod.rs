//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides, API keys)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → breakers, clients and service built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breaker thresholds change only on restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    CacheConfig, GatewayConfig, IdentificationConfig, ListenerConfig, LogFormat, MergeStrategy,
    ObservabilityConfig, PlantIdConfig, PlantNetConfig,
};
