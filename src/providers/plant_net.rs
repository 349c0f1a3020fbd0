//! PlantNet v2 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::cache::{cache_key, ResultCache};
use crate::config::PlantNetConfig;
use crate::providers::{
    build_http_client, check_status, clamp_confidence, IdentificationClient, IdentificationResult,
    IdentifyError, IdentifyOptions, ImageInput, Provider,
};

const PROVIDER: Provider = Provider::PlantNet;

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    #[serde(default)]
    results: Vec<SpeciesMatch>,
}

#[derive(Debug, Deserialize)]
struct SpeciesMatch {
    score: f64,
    species: Species,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Species {
    scientific_name_without_author: String,
    #[serde(default)]
    common_names: Vec<String>,
}

/// Client for the PlantNet identification API.
pub struct PlantNetClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    cache: ResultCache,
}

impl PlantNetClient {
    pub fn new(config: &PlantNetConfig, cache: ResultCache) -> Result<Self, IdentifyError> {
        Ok(Self {
            http: build_http_client(PROVIDER, config.request_timeout())?,
            endpoint: format!(
                "{}/v2/identify/{}",
                config.base_url.trim_end_matches('/'),
                config.project
            ),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
            cache,
        })
    }

    fn form(image: &ImageInput, options: &IdentifyOptions) -> Result<Form, IdentifyError> {
        let extension = match image.mime_type() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        };
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(format!("upload.{}", extension))
            .mime_str(image.mime_type())
            .map_err(|e| IdentifyError::InvalidImage(e.to_string()))?;

        let organ = options.organ.clone().unwrap_or_else(|| "auto".to_string());
        Ok(Form::new().part("images", part).text("organs", organ))
    }

    fn parse(response: IdentifyResponse, cache_key: String) -> Option<IdentificationResult> {
        let best = response.results.into_iter().next()?;
        let scientific_name = best.species.scientific_name_without_author;
        let plant_name = best
            .species
            .common_names
            .into_iter()
            .next()
            .unwrap_or_else(|| scientific_name.clone());

        Some(IdentificationResult {
            provider: PROVIDER,
            plant_name,
            scientific_name,
            confidence: clamp_confidence(best.score),
            disease_info: None,
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
            .query(&[("api-key", api_key), ("include-related-images", "false")])
            .multipart(Self::form(image, options)?)
            .send()
            .await
            .map_err(|e| IdentifyError::from_reqwest(PROVIDER, timeout_secs, e))?;

        // PlantNet answers 404 when no species matches the image.
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("PlantNet found no matching species");
            return Ok(None);
        }

        let response = check_status(PROVIDER, response).await?;
        let parsed: IdentifyResponse = response
            .json()
            .await
            .map_err(|e| IdentifyError::from_reqwest(PROVIDER, timeout_secs, e))?;

        Ok(Self::parse(parsed, cache_key))
    }
}

#[async_trait]
impl IdentificationClient for PlantNetClient {
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

        tracing::debug!(image_bytes = image.len(), organ = ?options.organ, "Calling PlantNet");
        let result = self.fetch(image, options, api_key, key).await?;
        if let Some(ref result) = result {
            self.cache.store(result).await;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_best_match() {
        let response: IdentifyResponse = serde_json::from_value(json!({
            "bestMatch": "Ficus lyrata Warb.",
            "results": [
                {"score": 0.81, "species": {
                    "scientificNameWithoutAuthor": "Ficus lyrata",
                    "scientificName": "Ficus lyrata Warb.",
                    "commonNames": ["Fiddle-leaf fig"]
                }},
                {"score": 0.05, "species": {"scientificNameWithoutAuthor": "Ficus elastica"}}
            ]
        }))
        .unwrap();

        let result = PlantNetClient::parse(response, "k".into()).unwrap();
        assert_eq!(result.provider, Provider::PlantNet);
        assert_eq!(result.plant_name, "Fiddle-leaf fig");
        assert_eq!(result.scientific_name, "Ficus lyrata");
        assert_eq!(result.confidence, 0.81);
    }

    #[test]
    fn test_parse_without_common_name_falls_back() {
        let response: IdentifyResponse = serde_json::from_value(json!({
            "results": [{"score": 1.4, "species": {"scientificNameWithoutAuthor": "Quercus robur"}}]
        }))
        .unwrap();

        let result = PlantNetClient::parse(response, "k".into()).unwrap();
        assert_eq!(result.plant_name, "Quercus robur");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_parse_empty_results_is_none() {
        let response: IdentifyResponse = serde_json::from_value(json!({"results": []})).unwrap();
        assert!(PlantNetClient::parse(response, "k".into()).is_none());
    }
}
