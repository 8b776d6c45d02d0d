// src/health/report.rs
use super::registry::RegisteredProbe;
use super::status::{HealthStatus, ProbeResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// One probe's contribution to an [`AggregateReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub tags: Vec<String>,
    pub status: HealthStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    pub duration_ms: u64,
}

impl ReportEntry {
    pub fn new(probe: &RegisteredProbe, result: ProbeResult, elapsed: Duration) -> Self {
        Self {
            name: probe.name.clone(),
            tags: probe.tags.iter().cloned().collect(),
            status: result.status,
            description: result.description,
            data: result.data,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Result of one evaluation pass. Built per request and never cached.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    #[serde(rename = "status")]
    pub overall_status: HealthStatus,
    pub evaluated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub entries: Vec<ReportEntry>,
}

impl AggregateReport {
    /// `entries` must already be in registration order.
    pub fn from_entries(
        entries: Vec<ReportEntry>,
        evaluated_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let overall_status = HealthStatus::worst(entries.iter().map(|e| e.status));
        Self {
            overall_status,
            evaluated_at,
            duration_ms: elapsed.as_millis() as u64,
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::from_entries(Vec::new(), Utc::now(), Duration::ZERO)
    }

    pub fn entry(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HealthStatus::Healthy
    }
}
