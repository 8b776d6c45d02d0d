// src/health/status.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Health of a single probe or of a whole evaluation.
///
/// Variants are declared from healthiest to least healthy so the derived
/// `Ord` is the aggregation order: `Healthy < Degraded < Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 3] = [
        HealthStatus::Healthy,
        HealthStatus::Degraded,
        HealthStatus::Unhealthy,
    ];

    /// Reduce a set of statuses to the least healthy one.
    /// An empty set is healthy.
    pub fn worst<I>(statuses: I) -> HealthStatus
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
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

/// Outcome of one probe execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub status: HealthStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

impl ProbeResult {
    pub fn new(status: HealthStatus, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            data: None,
        }
    }

    pub fn healthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy, description)
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded, description)
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy, description)
    }

    /// Attach one diagnostic key/value pair.
    pub fn with_data(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.to_string());
        self
    }
}
