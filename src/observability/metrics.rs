//! Metrics collection and exposition.
//!
//! # Metrics
//! - `plantid_breaker_transitions_total` (counter): by breaker, target state
//! - `plantid_breaker_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `plantid_breaker_rejections_total` (counter): fast-failed calls
//! - `plantid_provider_calls_total` (counter): by provider, outcome
//! - `plantid_cache_lookups_total` (counter): by provider, hit/miss/error
//! - `plantid_identifications_total` (counter): by outcome
//! - `plantid_identification_duration_seconds` (histogram)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    }
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    gauge!("plantid_breaker_state", "breaker" => breaker.to_string()).set(state_value(state));
}

pub fn record_breaker_transition(breaker: &str, to: CircuitState) {
    counter!(
        "plantid_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(breaker, to);
}

pub fn record_breaker_rejection(breaker: &str) {
    counter!("plantid_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_provider_call(provider: &'static str, outcome: &'static str) {
    counter!(
        "plantid_provider_calls_total",
        "provider" => provider,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_cache_lookup(provider: &'static str, result: &'static str) {
    counter!(
        "plantid_cache_lookups_total",
        "provider" => provider,
        "result" => result
    )
    .increment(1);
}

pub fn record_identification(outcome: &'static str, start: Instant) {
    counter!("plantid_identifications_total", "outcome" => outcome).increment(1);
    histogram!("plantid_identification_duration_seconds").record(start.elapsed().as_secs_f64());
}
