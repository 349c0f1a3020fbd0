//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::BreakerConfig;

/// Root configuration for the identification gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Plant.id provider settings.
    pub plant_id: PlantIdConfig,

    /// PlantNet provider settings.
    pub plant_net: PlantNetConfig,

    /// Identification result cache.
    pub cache: CacheConfig,

    /// Orchestration settings.
    pub identification: IdentificationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted image upload in bytes.
    pub max_body_bytes: usize,

    /// Total time allowed for one inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 60,
        }
    }
}

/// Plant.id (paid, low quota) provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlantIdConfig {
    /// API root, without trailing slash.
    pub base_url: String,

    /// API key. Usually supplied through `PLANT_ID_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Consecutive infrastructure failures before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before probing.
    pub reset_timeout_secs: u64,

    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,

    /// Per-request network timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for PlantIdConfig {
    fn default() -> Self {
        Self {
            base_url: "https://plant.id/api/v3".to_string(),
            api_key: None,
            failure_threshold: 3,
            reset_timeout_secs: 60,
            success_threshold: 2,
            request_timeout_secs: 45,
        }
    }
}

impl PlantIdConfig {
    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_secs(self.reset_timeout_secs),
            success_threshold: self.success_threshold,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// PlantNet (free, high quota) provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlantNetConfig {
    /// API root, without trailing slash.
    pub base_url: String,

    /// API key. Usually supplied through `PLANTNET_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Flora project to query ("all" for every project).
    pub project: String,

    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    pub success_threshold: u32,
    pub request_timeout_secs: u64,
}

impl Default for PlantNetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://my-api.plantnet.org".to_string(),
            api_key: None,
            project: "all".to_string(),
            failure_threshold: 5,
            reset_timeout_secs: 30,
            success_threshold: 2,
            request_timeout_secs: 30,
        }
    }
}

impl PlantNetConfig {
    pub fn breaker(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_secs(self.reset_timeout_secs),
            success_threshold: self.success_threshold,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Identification result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached identification in seconds.
    pub ttl_secs: u64,

    /// Upper bound on cached entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// How two successful provider results are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Plant.id is primary whenever it answered.
    #[default]
    PreferPlantId,
    /// The more confident answer is primary.
    HighestConfidence,
}

/// Orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentificationConfig {
    pub merge_strategy: MergeStrategy,

    /// Extra seconds the orchestrator waits beyond a provider's request
    /// timeout before giving up on its result.
    pub wait_grace_secs: u64,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::PreferPlantId,
            wait_grace_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
