//! External identification providers.
//!
//! # Data Flow
//! ```text
//! IdentificationClient::identify(image, options)
//!     → cache lookup (hit: return)
//!     → provider-specific HTTP request (plant_id.rs / plant_net.rs)
//!     → status + body → IdentifyError or IdentificationResult
//!     → cache store
//! ```
//!
//! # Design Decisions
//! - Clients know nothing about circuit breakers; the orchestrator wraps them
//! - Every request carries the provider's configured timeout
//! - A provider answering "no match" yields `Ok(None)`, not an error

pub mod error;
pub mod plant_id;
pub mod plant_net;
pub mod types;

use async_trait::async_trait;

pub use error::IdentifyError;
pub use plant_id::PlantIdClient;
pub use plant_net::PlantNetClient;
pub use types::{DiseaseInfo, IdentificationResult, IdentifyOptions, ImageInput, Provider};

/// A provider that can identify a plant from an image.
#[async_trait]
pub trait IdentificationClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Cache-only lookup; never touches the network.
    async fn cached(&self, image: &ImageInput, options: &IdentifyOptions) -> Option<IdentificationResult>;

    /// Identify through the cache, falling back to the provider API.
    async fn identify(
        &self,
        image: &ImageInput,
        options: &IdentifyOptions,
    ) -> Result<Option<IdentificationResult>, IdentifyError>;
}

/// Turn a non-success response into an error, keeping a short body excerpt.
pub(crate) async fn check_status(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, IdentifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > 200 {
        let mut cut = 200;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    Err(IdentifyError::from_status(provider, status.as_u16(), message))
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub(crate) fn build_http_client(
    provider: Provider,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, IdentifyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("plantid-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IdentifyError::Transport {
            provider,
            message: format!("failed to build HTTP client: {}", e),
        })
}
