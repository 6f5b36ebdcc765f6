use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

// ============================================================================
// Health Reporting
// ============================================================================
//
// Components (payment gateway, catalog cache, staff notification registry)
// push their status into a shared HealthReporter; the /health endpoint
// reads the aggregated view.
//
// ============================================================================

/// Health status of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Gauge encoding (0=Unhealthy, 1=Degraded, 2=Healthy)
    pub fn code(&self) -> i64 {
        match self {
            HealthStatus::Unhealthy(_) => 0,
            HealthStatus::Degraded(_) => 1,
            HealthStatus::Healthy => 2,
        }
    }
}

/// Health information for a component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct HealthReporter {
    components: Arc<DashMap<String, ComponentHealth>>,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, health: ComponentHealth) {
        tracing::debug!(
            component = %health.name,
            status = ?health.status,
            "Updated component health"
        );
        self.components.insert(health.name.clone(), health);
    }

    pub fn snapshot(&self) -> SystemHealth {
        let components: BTreeMap<String, ComponentHealth> = self
            .components
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        SystemHealth {
            overall_status: compute_overall_status(&components),
            components,
            check_time: Utc::now(),
        }
    }
}

fn compute_overall_status(components: &BTreeMap<String, ComponentHealth>) -> HealthStatus {
    let mut has_degraded = false;
    let mut unhealthy_components = Vec::new();

    for (name, health) in components {
        match &health.status {
            HealthStatus::Unhealthy(msg) => {
                unhealthy_components.push(format!("{}: {}", name, msg));
            }
            HealthStatus::Degraded(_) => {
                has_degraded = true;
            }
            HealthStatus::Healthy => {}
        }
    }

    if !unhealthy_components.is_empty() {
        HealthStatus::Unhealthy(unhealthy_components.join(", "))
    } else if has_degraded {
        HealthStatus::Degraded("Some components degraded".to_string())
    } else {
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reporter_is_healthy() {
        let reporter = HealthReporter::new();
        assert!(reporter.snapshot().overall_status.is_healthy());
    }

    #[test]
    fn test_unhealthy_wins_over_degraded() {
        let reporter = HealthReporter::new();
        reporter.update(ComponentHealth::new(
            "catalog_cache",
            HealthStatus::Degraded("slow".to_string()),
        ));
        reporter.update(ComponentHealth::new(
            "payment_gateway",
            HealthStatus::Unhealthy("Circuit breaker open".to_string()),
        ));

        let snapshot = reporter.snapshot();
        assert_eq!(
            snapshot.overall_status,
            HealthStatus::Unhealthy("payment_gateway: Circuit breaker open".to_string())
        );
        assert_eq!(snapshot.components.len(), 2);
    }

    #[test]
    fn test_latest_update_replaces_previous() {
        let reporter = HealthReporter::new();
        reporter.update(ComponentHealth::new(
            "payment_gateway",
            HealthStatus::Unhealthy("down".to_string()),
        ));
        reporter.update(ComponentHealth::new("payment_gateway", HealthStatus::Healthy));

        assert!(reporter.snapshot().overall_status.is_healthy());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(HealthStatus::Degraded("half-open".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "degraded", "reason": "half-open"}));
        let json = serde_json::to_value(HealthStatus::Healthy).unwrap();
        assert_eq!(json, serde_json::json!({"state": "healthy"}));
    }
}
