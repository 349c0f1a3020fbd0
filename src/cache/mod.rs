//! Identification result caching.
//!
//! # Data Flow
//! ```text
//! client.cached(image, options)             (before the breaker)
//!     → cache_key(provider, sha256(image), options)
//!     → ResultCache::lookup → CacheBackend::get
//!         hit  → deserialize, return (no network, no breaker)
//! client.identify(image, options)           (inside the breaker)
//!     → ResultCache::recheck (a miss is not counted twice)
//!     → HTTP call → ResultCache::store → CacheBackend::set(ttl)
//! ```
//!
//! # Design Decisions
//! - The backend is best-effort: errors become misses or skipped writes
//! - Values are JSON-serialized `IdentificationResult`s
//! - Duplicate writes under races are harmless (same input, same value)

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::observability::metrics;
use crate::providers::{IdentificationResult, IdentifyOptions, ImageInput, Provider};

pub use memory::MemoryCache;

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// Deterministic cache key for one provider, image and option set.
pub fn cache_key(provider: Provider, image: &ImageInput, options: &IdentifyOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.id().as_bytes());
    hasher.update(b"|");
    hasher.update(image.digest().as_bytes());
    hasher.update(b"|");
    hasher.update(options.organ.as_deref().unwrap_or("auto").as_bytes());
    hasher.update(b"|");
    hasher.update(if options.include_disease { b"disease" as &[u8] } else { b"plain" });

    format!("plant_identification:{}:{:x}", provider.id(), hasher.finalize())
}

/// Typed, failure-tolerant view over a [`CacheBackend`].
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a cached result. Backend or decoding errors count as a miss.
    pub async fn lookup(&self, provider: Provider, key: &str) -> Option<IdentificationResult> {
        self.read(provider, key, true).await
    }

    /// Look again right before going to the network. Hits are counted; a
    /// miss was already counted by the `lookup` that preceded it.
    pub async fn recheck(&self, provider: Provider, key: &str) -> Option<IdentificationResult> {
        self.read(provider, key, false).await
    }

    async fn read(&self, provider: Provider, key: &str, count_miss: bool) -> Option<IdentificationResult> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                if count_miss {
                    metrics::record_cache_lookup(provider.id(), "miss");
                }
                return None;
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Cache read failed, treating as miss");
                metrics::record_cache_lookup(provider.id(), "error");
                return None;
            }
        };

        match serde_json::from_slice::<IdentificationResult>(&raw) {
            Ok(result) => {
                tracing::debug!(provider = %provider, cache_key = %key, "Cache hit");
                metrics::record_cache_lookup(provider.id(), "hit");
                Some(result)
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Discarding undecodable cache entry");
                metrics::record_cache_lookup(provider.id(), "error");
                None
            }
        }
    }

    /// Store a result under its own cache key. Failures are logged only.
    pub async fn store(&self, result: &IdentificationResult) {
        let value = match serde_json::to_vec(result) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(provider = %result.provider, error = %e, "Failed to serialize result for cache");
                return;
            }
        };
        if let Err(e) = self.backend.set(&result.cache_key, value, self.ttl).await {
            tracing::warn!(provider = %result.provider, error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    fn sample(key: &str) -> IdentificationResult {
        IdentificationResult {
            provider: Provider::PlantId,
            plant_name: "Swiss cheese plant".into(),
            scientific_name: "Monstera deliciosa".into(),
            confidence: 0.93,
            disease_info: None,
            cache_key: key.into(),
        }
    }

    #[test]
    fn test_cache_key_is_deterministic_and_discriminating() {
        let image = ImageInput::new(b"leaf".to_vec());
        let plain = IdentifyOptions::default();
        let with_disease = IdentifyOptions {
            include_disease: true,
            ..IdentifyOptions::default()
        };

        let a = cache_key(Provider::PlantId, &image, &plain);
        assert_eq!(a, cache_key(Provider::PlantId, &ImageInput::new(b"leaf".to_vec()), &plain));
        assert!(a.starts_with("plant_identification:plant_id:"));
        assert_ne!(a, cache_key(Provider::PlantNet, &image, &plain));
        assert_ne!(a, cache_key(Provider::PlantId, &image, &with_disease));
        assert_ne!(a, cache_key(Provider::PlantId, &ImageInput::new(b"bark".to_vec()), &plain));
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_backend() {
        let cache = ResultCache::new(Arc::new(MemoryCache::new(16)), Duration::from_secs(60));
        let result = sample("k1");

        assert!(cache.lookup(Provider::PlantId, "k1").await.is_none());
        cache.store(&result).await;
        assert_eq!(cache.lookup(Provider::PlantId, "k1").await, Some(result));
    }

    fn counter(rendered: &str, result: &str) -> Option<f64> {
        let label = format!("result=\"{}\"", result);
        rendered
            .lines()
            .find(|line| line.starts_with("plantid_cache_lookups_total{") && line.contains(&label))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn test_recheck_does_not_count_a_second_miss() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let cache = ResultCache::new(Arc::new(MemoryCache::new(16)), Duration::from_secs(60));
                assert!(cache.lookup(Provider::PlantId, "k1").await.is_none());
                assert!(cache.recheck(Provider::PlantId, "k1").await.is_none());

                cache.store(&sample("k1")).await;
                assert!(cache.recheck(Provider::PlantId, "k1").await.is_some());
            });
        });

        let rendered = handle.render();
        assert_eq!(counter(&rendered, "miss"), Some(1.0));
        assert_eq!(counter(&rendered, "hit"), Some(1.0));
    }

    #[tokio::test]
    async fn test_backend_outage_is_a_miss() {
        let cache = ResultCache::new(Arc::new(BrokenBackend), Duration::from_secs(60));
        cache.store(&sample("k1")).await;
        assert!(cache.lookup(Provider::PlantId, "k1").await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_entry_is_a_miss() {
        let backend = Arc::new(MemoryCache::new(16));
        backend.set("k1", b"not json".to_vec(), Duration::from_secs(60)).await.unwrap();
        let cache = ResultCache::new(backend, Duration::from_secs(60));
        assert!(cache.lookup(Provider::PlantId, "k1").await.is_none());
    }
}
