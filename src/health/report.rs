//! Health status and report types.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::identification::IdentificationService;
use crate::providers::Provider;
use crate::resilience::{BreakerSnapshot, CircuitState};

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Both breakers closed.
    Healthy,
    /// Exactly one provider impaired, or one recovering.
    Degraded,
    /// Both breakers open.
    Unhealthy,
}

impl HealthStatus {
    pub fn from_states(plant_id: CircuitState, plant_net: CircuitState) -> Self {
        match (plant_id, plant_net) {
            (CircuitState::Closed, CircuitState::Closed) => HealthStatus::Healthy,
            (CircuitState::Open, CircuitState::Open) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        }
    }

    /// Whether the service can still answer identification requests.
    pub fn is_serving(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub providers: BTreeMap<&'static str, BreakerSnapshot>,
}

impl HealthReport {
    pub fn collect(service: &IdentificationService) -> Self {
        let plant_id = service.plant_id_breaker().snapshot();
        let plant_net = service.plant_net_breaker().snapshot();
        let status = HealthStatus::from_states(plant_id.state, plant_net.state);

        let mut providers = BTreeMap::new();
        providers.insert(Provider::PlantId.id(), plant_id);
        providers.insert(Provider::PlantNet.id(), plant_net);

        Self { status, providers }
    }
}
