//! Provider-neutral identification types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// External identification provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    PlantId,
    PlantNet,
}

impl Provider {
    /// Stable identifier used in cache keys, metrics and JSON.
    pub fn id(&self) -> &'static str {
        match self {
            Provider::PlantId => "plant_id",
            Provider::PlantNet => "plant_net",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::PlantId => "Plant.id",
            Provider::PlantNet => "PlantNet",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Disease assessment attached to a Plant.id answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    pub name: String,
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_healthy: Option<bool>,
}

/// One provider's answer for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub provider: Provider,
    /// Common name when the provider knows one, scientific name otherwise.
    pub plant_name: String,
    pub scientific_name: String,
    /// Provider confidence in 0.0..=1.0.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_info: Option<DiseaseInfo>,
    /// Cache key this result was stored under.
    pub cache_key: String,
}

/// Caller-supplied identification hints. Every field is part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyOptions {
    /// Plant organ shown in the image (`leaf`, `flower`, `fruit`, `bark`, ...).
    pub organ: Option<String>,
    /// Ask for a health assessment where the provider supports it.
    pub include_disease: bool,
}

/// Uploaded image bytes plus their SHA-256 digest, cheap to clone.
#[derive(Clone)]
pub struct ImageInput {
    bytes: Arc<[u8]>,
    digest: String,
}

impl ImageInput {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let digest = format!("{:x}", Sha256::digest(&bytes));
        Self {
            bytes: bytes.into(),
            digest,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 of the image content.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type sniffed from magic bytes, JPEG when unknown.
    pub fn mime_type(&self) -> &'static str {
        match self.bytes() {
            [0x89, b'P', b'N', b'G', ..] => "image/png",
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
            [b'G', b'I', b'F', b'8', ..] => "image/gif",
            _ => "image/jpeg",
        }
    }
}

impl fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageInput")
            .field("len", &self.bytes.len())
            .field("digest", &self.digest)
            .finish()
    }
}
