//! Dual-provider identification with graceful degradation.
//!
//! # Responsibilities
//! - Inspect both breakers before dispatching anything
//! - Fan out to the available providers on the tokio runtime
//! - Bound every wait with the provider's own deadline
//! - Convert every provider failure into an absent result
//! - Merge by provider identity

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::MergeStrategy;
use crate::identification::merge::CombinedResult;
use crate::observability::metrics;
use crate::providers::{
    IdentificationClient, IdentificationResult, IdentifyError, IdentifyOptions, ImageInput, Provider,
};
use crate::resilience::{BreakerConfig, BreakerError, CircuitBreaker, CircuitState};

/// Breaker for one provider, counting only infrastructure failures.
pub fn provider_breaker(provider: Provider, config: BreakerConfig) -> CircuitBreaker<IdentifyError> {
    CircuitBreaker::with_classifier(provider.id(), config, IdentifyError::is_infrastructure_failure)
}

/// A client, the breaker guarding it, and how long to wait for its answer.
pub struct ProviderSlot {
    client: Arc<dyn IdentificationClient>,
    breaker: Arc<CircuitBreaker<IdentifyError>>,
    wait_timeout: Duration,
}

impl ProviderSlot {
    pub fn new(
        client: Arc<dyn IdentificationClient>,
        breaker: Arc<CircuitBreaker<IdentifyError>>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            client,
            breaker,
            wait_timeout,
        }
    }

    pub fn provider(&self) -> Provider {
        self.client.provider()
    }

    pub fn breaker(&self) -> &CircuitBreaker<IdentifyError> {
        &self.breaker
    }

    async fn run(&self, image: &ImageInput, options: &IdentifyOptions) -> Option<IdentificationResult> {
        let provider = self.provider();

        if let Some(hit) = self.client.cached(image, options).await {
            tracing::debug!(provider = %provider, "Served from cache");
            metrics::record_provider_call(provider.id(), "cache_hit");
            return Some(hit);
        }

        match self.breaker.call(|| self.client.identify(image, options)).await {
            Ok(Some(result)) => {
                tracing::debug!(
                    provider = %provider,
                    scientific_name = %result.scientific_name,
                    confidence = result.confidence,
                    "Provider identified plant"
                );
                metrics::record_provider_call(provider.id(), "success");
                Some(result)
            }
            Ok(None) => {
                tracing::info!(provider = %provider, "Provider found no match");
                metrics::record_provider_call(provider.id(), "no_match");
                None
            }
            Err(BreakerError::Open { retry_after, .. }) => {
                tracing::info!(
                    provider = %provider,
                    retry_after_secs = retry_after.as_secs(),
                    "Circuit opened before dispatch, skipping provider"
                );
                metrics::record_provider_call(provider.id(), "circuit_open");
                None
            }
            Err(BreakerError::Operation(err)) if err.is_infrastructure_failure() => {
                tracing::warn!(
                    provider = %provider,
                    error = %err,
                    breaker_state = %self.breaker.snapshot().state,
                    "Provider unavailable"
                );
                metrics::record_provider_call(provider.id(), err.kind());
                None
            }
            Err(BreakerError::Operation(err)) => {
                tracing::info!(provider = %provider, error = %err, "Provider declined request");
                metrics::record_provider_call(provider.id(), err.kind());
                None
            }
        }
    }
}

/// Orchestrates Plant.id and PlantNet behind their breakers.
pub struct IdentificationService {
    plant_id: Arc<ProviderSlot>,
    plant_net: Arc<ProviderSlot>,
    merge_strategy: MergeStrategy,
}

impl IdentificationService {
    pub fn new(plant_id: ProviderSlot, plant_net: ProviderSlot, merge_strategy: MergeStrategy) -> Self {
        Self {
            plant_id: Arc::new(plant_id),
            plant_net: Arc::new(plant_net),
            merge_strategy,
        }
    }

    pub fn plant_id_breaker(&self) -> &CircuitBreaker<IdentifyError> {
        self.plant_id.breaker()
    }

    pub fn plant_net_breaker(&self) -> &CircuitBreaker<IdentifyError> {
        self.plant_net.breaker()
    }

    /// Identify a plant. Never fails: provider problems surface as a degraded
    /// result or a structured `error`.
    pub async fn identify(&self, image: ImageInput, options: IdentifyOptions) -> CombinedResult {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "identify",
            %request_id,
            image_bytes = image.len(),
            image_digest = %image.digest()
        );
        self.identify_inner(image, options).instrument(span).await
    }

    async fn identify_inner(&self, image: ImageInput, options: IdentifyOptions) -> CombinedResult {
        let start = std::time::Instant::now();
        let plant_id_state = self.plant_id.breaker.state();
        let plant_net_state = self.plant_net.breaker.state();

        let result = match (plant_id_state == CircuitState::Open, plant_net_state == CircuitState::Open) {
            (true, true) => {
                let retry_after = [self.plant_id.breaker.retry_after(), self.plant_net.breaker.retry_after()]
                    .into_iter()
                    .flatten()
                    .min();
                tracing::warn!(
                    plant_id_state = %plant_id_state,
                    plant_net_state = %plant_net_state,
                    retry_after_secs = retry_after.map(|d| d.as_secs()),
                    "All identification sources unavailable"
                );
                CombinedResult::unavailable(retry_after)
            }
            (true, false) => {
                tracing::info!(
                    plant_id_state = %plant_id_state,
                    plant_net_state = %plant_net_state,
                    "Plant.id circuit open, using PlantNet only"
                );
                let plant_net = collect(&self.plant_net, dispatch(&self.plant_net, &image, &options)).await;
                CombinedResult::merge(None, plant_net, self.merge_strategy)
            }
            (false, true) => {
                tracing::info!(
                    plant_id_state = %plant_id_state,
                    plant_net_state = %plant_net_state,
                    "PlantNet circuit open, using Plant.id only"
                );
                let plant_id = collect(&self.plant_id, dispatch(&self.plant_id, &image, &options)).await;
                CombinedResult::merge(plant_id, None, self.merge_strategy)
            }
            (false, false) => {
                let plant_id_task = dispatch(&self.plant_id, &image, &options);
                let plant_net_task = dispatch(&self.plant_net, &image, &options);
                let (plant_id, plant_net) = tokio::join!(
                    collect(&self.plant_id, plant_id_task),
                    collect(&self.plant_net, plant_net_task)
                );
                CombinedResult::merge(plant_id, plant_net, self.merge_strategy)
            }
        };

        let outcome = result.outcome();
        if result.degraded {
            tracing::warn!(
                outcome,
                primary = ?result.primary.as_ref().map(|r| r.provider),
                error = ?result.error,
                plant_id_state = %self.plant_id.breaker.snapshot().state,
                plant_net_state = %self.plant_net.breaker.snapshot().state,
                "Identification degraded"
            );
        } else {
            tracing::info!(
                outcome,
                primary = ?result.primary.as_ref().map(|r| r.provider),
                "Identification merged"
            );
        }
        metrics::record_identification(outcome, start);

        result
    }
}

fn dispatch(
    slot: &Arc<ProviderSlot>,
    image: &ImageInput,
    options: &IdentifyOptions,
) -> JoinHandle<Option<IdentificationResult>> {
    let slot = Arc::clone(slot);
    let image = image.clone();
    let options = options.clone();
    tokio::spawn(async move { slot.run(&image, &options).await }.in_current_span())
}

/// Await a provider task within its deadline. On timeout the handle is
/// dropped; the task runs to completion on its own and its result is lost.
async fn collect(
    slot: &ProviderSlot,
    handle: JoinHandle<Option<IdentificationResult>>,
) -> Option<IdentificationResult> {
    let provider = slot.provider();
    match tokio::time::timeout(slot.wait_timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::error!(provider = %provider, error = %e, "Provider task aborted");
            metrics::record_provider_call(provider.id(), "task_failed");
            None
        }
        Err(_) => {
            tracing::warn!(
                provider = %provider,
                wait_secs = slot.wait_timeout.as_secs(),
                "Provider did not answer in time, discarding late result"
            );
            metrics::record_provider_call(provider.id(), "wait_timeout");
            None
        }
    }
}
