//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared result cache
//! - Build both provider clients and their breakers from config
//! - Assemble the identification service
//!
//! # Design Decisions
//! - Fail fast: a client that cannot be built aborts startup
//! - A missing API key is a warning, not an error; the provider answers
//!   `NotConfigured` and the gateway degrades to the other one

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{MemoryCache, ResultCache};
use crate::config::GatewayConfig;
use crate::identification::{provider_breaker, IdentificationService, ProviderSlot};
use crate::providers::{IdentifyError, PlantIdClient, PlantNetClient, Provider};

/// Wire clients, breakers and cache into a ready service.
pub fn build_service(config: &GatewayConfig) -> Result<IdentificationService, IdentifyError> {
    let backend = Arc::new(MemoryCache::new(config.cache.max_entries));
    let cache = ResultCache::new(backend, config.cache.ttl());
    let grace = Duration::from_secs(config.identification.wait_grace_secs);

    if config.plant_id.api_key.is_none() {
        tracing::warn!(provider = %Provider::PlantId, "No API key configured, provider will be skipped");
    }
    if config.plant_net.api_key.is_none() {
        tracing::warn!(provider = %Provider::PlantNet, "No API key configured, provider will be skipped");
    }

    let plant_id = ProviderSlot::new(
        Arc::new(PlantIdClient::new(&config.plant_id, cache.clone())?),
        Arc::new(provider_breaker(Provider::PlantId, config.plant_id.breaker())),
        config.plant_id.request_timeout() + grace,
    );
    let plant_net = ProviderSlot::new(
        Arc::new(PlantNetClient::new(&config.plant_net, cache)?),
        Arc::new(provider_breaker(Provider::PlantNet, config.plant_net.breaker())),
        config.plant_net.request_timeout() + grace,
    );

    tracing::info!(
        plant_id_failure_threshold = config.plant_id.failure_threshold,
        plant_id_reset_timeout_secs = config.plant_id.reset_timeout_secs,
        plant_net_failure_threshold = config.plant_net.failure_threshold,
        plant_net_reset_timeout_secs = config.plant_net.reset_timeout_secs,
        merge_strategy = ?config.identification.merge_strategy,
        cache_ttl_secs = config.cache.ttl_secs,
        "Identification service ready"
    );

    Ok(IdentificationService::new(
        plant_id,
        plant_net,
        config.identification.merge_strategy,
    ))
}
