//! Combined identification response and merge rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::MergeStrategy;
use crate::providers::IdentificationResult;

pub const NO_SOURCES_AVAILABLE: &str = "no identification sources available";
pub const ALL_SOURCES_FAILED: &str = "all identification sources failed";

/// Unified answer built from up to two provider results.
///
/// When both `primary` and `secondary` are absent, `error` is always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub primary: Option<IdentificationResult>,
    pub secondary: Option<IdentificationResult>,
    /// Fewer than two providers contributed.
    pub degraded: bool,
    pub error: Option<String>,
    /// Seconds until the first breaker may admit calls again; only set when
    /// every provider was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl CombinedResult {
    /// Every breaker is open; nothing was attempted.
    pub fn unavailable(retry_after: Option<Duration>) -> Self {
        Self {
            primary: None,
            secondary: None,
            degraded: true,
            error: Some(NO_SOURCES_AVAILABLE.to_string()),
            retry_after_secs: retry_after.map(|d| (d.as_secs() + u64::from(d.subsec_nanos() > 0)).max(1)),
        }
    }

    /// Merge per-provider outcomes, keyed by provider rather than arrival order.
    pub fn merge(
        plant_id: Option<IdentificationResult>,
        plant_net: Option<IdentificationResult>,
        strategy: MergeStrategy,
    ) -> Self {
        match (plant_id, plant_net) {
            (Some(a), Some(b)) => {
                let (primary, secondary) = match strategy {
                    MergeStrategy::PreferPlantId => (a, b),
                    MergeStrategy::HighestConfidence if b.confidence > a.confidence => (b, a),
                    MergeStrategy::HighestConfidence => (a, b),
                };
                Self {
                    primary: Some(primary),
                    secondary: Some(secondary),
                    degraded: false,
                    error: None,
                    retry_after_secs: None,
                }
            }
            (Some(only), None) | (None, Some(only)) => Self {
                primary: Some(only),
                secondary: None,
                degraded: true,
                error: None,
                retry_after_secs: None,
            },
            (None, None) => Self {
                primary: None,
                secondary: None,
                degraded: true,
                error: Some(ALL_SOURCES_FAILED.to_string()),
                retry_after_secs: None,
            },
        }
    }

    /// True when at least one provider produced a result.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match (&self.error, self.degraded) {
            (Some(_), _) if self.retry_after_secs.is_some() => "unavailable",
            (Some(_), _) => "failed",
            (None, true) => "degraded",
            (None, false) => "merged",
        }
    }
}
