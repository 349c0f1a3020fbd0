//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - Validate provider base URLs
//! - Keep the inbound request deadline above every provider wait, so a slow
//!   provider degrades the answer instead of timing out the whole request
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

struct ProviderFields<'a> {
    section: &'static str,
    base_url: &'a str,
    failure_threshold: u32,
    reset_timeout_secs: u64,
    success_threshold: u32,
    request_timeout_secs: u64,
}

fn check_provider(p: ProviderFields<'_>, errors: &mut Vec<ValidationError>) {
    if let Err(e) = url::Url::parse(p.base_url) {
        errors.push(ValidationError::new(
            format!("{}.base_url", p.section),
            format!("invalid URL '{}': {}", p.base_url, e),
        ));
    }
    let positive = [
        ("failure_threshold", p.failure_threshold as u64),
        ("reset_timeout_secs", p.reset_timeout_secs),
        ("success_threshold", p.success_threshold as u64),
        ("request_timeout_secs", p.request_timeout_secs),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(
                format!("{}.{}", p.section, name),
                "must be greater than zero",
            ));
        }
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than zero"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than zero"));
    }

    check_provider(
        ProviderFields {
            section: "plant_id",
            base_url: &config.plant_id.base_url,
            failure_threshold: config.plant_id.failure_threshold,
            reset_timeout_secs: config.plant_id.reset_timeout_secs,
            success_threshold: config.plant_id.success_threshold,
            request_timeout_secs: config.plant_id.request_timeout_secs,
        },
        &mut errors,
    );
    check_provider(
        ProviderFields {
            section: "plant_net",
            base_url: &config.plant_net.base_url,
            failure_threshold: config.plant_net.failure_threshold,
            reset_timeout_secs: config.plant_net.reset_timeout_secs,
            success_threshold: config.plant_net.success_threshold,
            request_timeout_secs: config.plant_net.request_timeout_secs,
        },
        &mut errors,
    );
    let grace = config.identification.wait_grace_secs;
    let provider_waits = [
        ("plant_id", config.plant_id.request_timeout_secs),
        ("plant_net", config.plant_net.request_timeout_secs),
    ];
    for (section, request_timeout_secs) in provider_waits {
        let wait = request_timeout_secs.saturating_add(grace);
        if config.listener.request_timeout_secs <= wait {
            errors.push(ValidationError::new(
                "listener.request_timeout_secs",
                format!(
                    "must exceed {}.request_timeout_secs + identification.wait_grace_secs ({}s), got {}s",
                    section, wait, config.listener.request_timeout_secs
                ),
            ));
        }
    }

    if config.plant_net.project.trim().is_empty() {
        errors.push(ValidationError::new("plant_net.project", "must not be empty"));
    }

    if config.cache.max_entries == 0 {
        errors.push(ValidationError::new("cache.max_entries", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
