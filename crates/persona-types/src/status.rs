//! Health and status report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Result of one component check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

/// Aggregate of all component checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Build a report; any unhealthy component degrades the whole.
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let status = if components.iter().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            components,
            checked_at: Utc::now(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Response cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

/// Request latency and error counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_requests: u64,
    pub error_count: u64,
    pub error_rate_percent: f64,
    pub in_flight_requests: u64,
    pub avg_response_ms: f64,
    pub p95_response_ms: f64,
    pub uptime_secs: u64,
}

/// Conversation and message totals, when the store answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageTotals {
    pub conversations: u64,
    pub messages: u64,
}

/// Extended status served by the system status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub health: HealthReport,
    pub engine_available: bool,
    pub model: String,
    pub persona_source: String,
    pub performance: PerformanceSnapshot,
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, healthy: bool) -> ComponentHealth {
        ComponentHealth {
            name: name.to_string(),
            healthy,
            detail: None,
            latency_ms: 1,
        }
    }

    #[test]
    fn test_all_healthy_components() {
        let report = HealthReport::from_components(vec![
            component("database", true),
            component("persona", true),
        ]);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_one_failure_degrades() {
        let report = HealthReport::from_components(vec![
            component("database", false),
            component("persona", true),
        ]);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!report.component("database").unwrap().healthy);
        assert!(report.component("llm_credentials").is_none());
    }

    #[test]
    fn test_health_status_serde() {
        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
