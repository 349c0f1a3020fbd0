//! Provider error taxonomy.

use thiserror::Error;

use crate::providers::types::Provider;

/// Errors raised by an identification client.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The request exceeded the client timeout.
    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: Provider, secs: u64 },

    /// Connection refused, reset, DNS failure and the like.
    #[error("{provider} transport error: {message}")]
    Transport { provider: Provider, message: String },

    /// The provider answered with a 5xx status.
    #[error("{provider} returned server error {status}")]
    Upstream { provider: Provider, status: u16 },

    /// The provider's quota or rate limit is exhausted.
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: Provider },

    /// The provider refused this particular request (4xx).
    #[error("{provider} rejected the request ({status}): {message}")]
    Rejected {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("{provider} returned an unreadable response: {message}")]
    Decode { provider: Provider, message: String },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("{provider} is not configured: missing API key")]
    NotConfigured { provider: Provider },
}

impl IdentifyError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(provider: Provider, status: u16, message: String) -> Self {
        match status {
            429 => IdentifyError::RateLimited { provider },
            500..=599 => IdentifyError::Upstream { provider, status },
            _ => IdentifyError::Rejected {
                provider,
                status,
                message,
            },
        }
    }

    /// Map a reqwest failure.
    pub fn from_reqwest(provider: Provider, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IdentifyError::Timeout {
                provider,
                secs: timeout_secs,
            }
        } else if err.is_decode() {
            IdentifyError::Decode {
                provider,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            IdentifyError::from_status(provider, status.as_u16(), err.to_string())
        } else {
            IdentifyError::Transport {
                provider,
                message: err.to_string(),
            }
        }
    }

    /// True for failures of the provider or the network, which count toward
    /// opening its breaker. Problems with the caller's input or our own
    /// configuration do not.
    pub fn is_infrastructure_failure(&self) -> bool {
        match self {
            IdentifyError::Timeout { .. }
            | IdentifyError::Transport { .. }
            | IdentifyError::Upstream { .. }
            | IdentifyError::RateLimited { .. }
            | IdentifyError::Decode { .. } => true,
            IdentifyError::Rejected { .. }
            | IdentifyError::InvalidImage(_)
            | IdentifyError::NotConfigured { .. } => false,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentifyError::Timeout { .. } => "timeout",
            IdentifyError::Transport { .. } => "transport",
            IdentifyError::Upstream { .. } => "upstream",
            IdentifyError::RateLimited { .. } => "rate_limited",
            IdentifyError::Rejected { .. } => "rejected",
            IdentifyError::Decode { .. } => "decode",
            IdentifyError::InvalidImage(_) => "invalid_image",
            IdentifyError::NotConfigured { .. } => "not_configured",
        }
    }
}
