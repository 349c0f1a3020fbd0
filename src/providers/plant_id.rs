//! Plant.id v3 client.
//!
//! # Responsibilities
//! - Send the image as a base64 data URL in a JSON body
//! - Authenticate with the `Api-Key` header
//! - Request a health assessment when disease info is wanted
//! - Parse the top classification and disease suggestions

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cache::{cache_key, ResultCache};
use crate::config::PlantIdConfig;
use crate::providers::{
    build_http_client, check_status, clamp_confidence, DiseaseInfo, IdentificationClient,
    IdentificationResult, IdentifyError, IdentifyOptions, ImageInput, Provider,
};

const PROVIDER: Provider = Provider::PlantId;

#[derive(Debug, Deserialize)]
struct IdentificationResponse {
    result: Option<ResultBody>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    classification: Option<Classification>,
    disease: Option<Classification>,
    is_healthy: Option<Healthiness>,
}

#[derive(Debug, Deserialize)]
struct Classification {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    name: String,
    probability: f64,
    #[serde(default)]
    details: Option<SuggestionDetails>,
}

#[derive(Debug, Deserialize)]
struct SuggestionDetails {
    #[serde(default)]
    common_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Healthiness {
    binary: Option<bool>,
}

/// Client for the Plant.id identification API.
pub struct PlantIdClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    cache: ResultCache,
}

impl PlantIdClient {
    pub fn new(config: &PlantIdConfig, cache: ResultCache) -> Result<Self, IdentifyError> {
        Ok(Self {
            http: build_http_client(PROVIDER, config.request_timeout())?,
            endpoint: format!("{}/identification", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
            cache,
        })
    }

    fn request_body(image: &ImageInput, options: &IdentifyOptions) -> Value {
        let data_url = format!("data:{};base64,{}", image.mime_type(), BASE64.encode(image.bytes()));
        let mut body = json!({
            "images": [data_url],
            "similar_images": false,
        });
        if options.include_disease {
            body["health"] = json!("all");
        }
        body
    }

    fn parse(
        response: IdentificationResponse,
        options: &IdentifyOptions,
        cache_key: String,
    ) -> Option<IdentificationResult> {
        let body = response.result?;
        let top = body.classification?.suggestions.into_iter().next()?;

        let disease_info = if options.include_disease {
            let is_healthy = body.is_healthy.and_then(|h| h.binary);
            body.disease
                .and_then(|d| d.suggestions.into_iter().next())
                .map(|d| DiseaseInfo {
                    name: d.name,
                    probability: clamp_confidence(d.probability),
                    is_healthy,
                })
        } else {
            None
        };

        let common_name = top
            .details
            .and_then(|d| d.common_names)
            .and_then(|names| names.into_iter().next());

        Some(IdentificationResult {
            provider: PROVIDER,
            plant_name: common_name.unwrap_or_else(|| top.name.clone()),
            scientific_name: top.name,
            confidence: clamp_confidence(top.probability),
            disease_info,
            cache_key,
        })
    }

    async fn fetch(
        &self,
        image: &ImageInput,
        options: &IdentifyOptions,
        api_key: &str,
        cache_key: String,
    ) -> Result<Option<IdentificationResult>, IdentifyError> {
        let timeout_secs = self.timeout.as_secs();
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("details", "common_names")])
            .header("Api-Key", api_key)
            .json(&Self::request_body(image, options))
            .send()
            .await
            .map_err(|e| IdentifyError::from_reqwest(PROVIDER, timeout_secs, e))?;

        let response = check_status(PROVIDER, response).await?;
        let parsed: IdentificationResponse = response
            .json()
            .await
            .map_err(|e| IdentifyError::from_reqwest(PROVIDER, timeout_secs, e))?;

        Ok(Self::parse(parsed, options, cache_key))
    }
}

#[async_trait]
impl IdentificationClient for PlantIdClient {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn cached(&self, image: &ImageInput, options: &IdentifyOptions) -> Option<IdentificationResult> {
        if image.is_empty() {
            return None;
        }
        self.cache.lookup(PROVIDER, &cache_key(PROVIDER, image, options)).await
    }

    async fn identify(
        &self,
        image: &ImageInput,
        options: &IdentifyOptions,
    ) -> Result<Option<IdentificationResult>, IdentifyError> {
        if image.is_empty() {
            return Err(IdentifyError::InvalidImage("image is empty".to_string()));
        }

        let key = cache_key(PROVIDER, image, options);
        if let Some(hit) = self.cache.recheck(PROVIDER, &key).await {
            return Ok(Some(hit));
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or(IdentifyError::NotConfigured { provider: PROVIDER })?;

        tracing::debug!(image_bytes = image.len(), include_disease = options.include_disease, "Calling Plant.id");
        let result = self.fetch(image, options, api_key, key).await?;
        if let Some(ref result) = result {
            self.cache.store(result).await;
        }
        Ok(result)
    }
}
