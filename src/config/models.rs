// src/config/models.rs
use crate::health::HealthStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

pub const LIVE_TIER: &str = "live";
pub const READY_TIER: &str = "ready";
pub const READY_TAG: &str = "ready";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one tier must be configured")]
    NoTiers,

    #[error("tier '{0}' is configured more than once")]
    DuplicateTier(String),

    #[error("tier '{tier}' path '{path}' must start with '/'")]
    InvalidPath { tier: String, path: String },

    #[error("path '{0}' is bound to more than one tier")]
    DuplicatePath(String),

    #[error("tier '{tier}' maps {status} to {code}, which is not a valid HTTP status")]
    InvalidStatusCode {
        tier: String,
        status: HealthStatus,
        code: u16,
    },

    #[error("tier '{tier}' maps {status} to {code}, {reason} its healthy range {min}-{max}")]
    InconsistentCodes {
        tier: String,
        status: HealthStatus,
        code: u16,
        reason: &'static str,
        min: u16,
        max: u16,
    },

    #[error("the liveness tier must not select any probes")]
    LivenessSelectsProbes,

    #[error("evaluation timeout must be greater than zero")]
    ZeroTimeout,

    #[error("probe '{0}' is declared more than once")]
    DuplicateProbe(String),

    #[error("probe '{0}' cannot report a fault as healthy")]
    HealthyFailureStatus(String),

    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error("metrics path '{0}' must start with '/'")]
    InvalidMetricsPath(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub evaluation: EvaluationConfig,
    pub tiers: Vec<TierConfig>,
    pub probes: Vec<ProbeConfig>,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            evaluation: EvaluationConfig::default(),
            tiers: vec![TierConfig::liveness(), TierConfig::readiness()],
            probes: vec![ProbeConfig {
                name: "live-check".to_string(),
                tags: vec![READY_TAG.to_string()],
                failure_status: Some(HealthStatus::Degraded),
                check: ProbeKind::Static {
                    status: HealthStatus::Healthy,
                    description: "A healthy result.".to_string(),
                },
            }],
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_grace_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The metrics listener shares the server's interface.
    pub fn metrics_addr(&self, metrics: &MetricsConfig) -> Result<SocketAddr, ConfigError> {
        let mut addr = self.socket_addr()?;
        addr.set_port(metrics.port);
        Ok(addr)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub timeout_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl EvaluationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which registered probes a tier runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSelector {
    None,
    All,
    Tag(String),
    AnyTag(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCodeTable {
    pub healthy: u16,
    pub degraded: u16,
    pub unhealthy: u16,
}

impl Default for StatusCodeTable {
    fn default() -> Self {
        Self {
            healthy: 200,
            degraded: 207,
            unhealthy: 503,
        }
    }
}

/// Response codes an external prober should count as healthy, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthyCodeRange {
    pub min: u16,
    pub max: u16,
}

impl Default for HealthyCodeRange {
    fn default() -> Self {
        Self { min: 200, max: 299 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    pub path: String,
    pub selector: ProbeSelector,
    #[serde(default)]
    pub status_codes: StatusCodeTable,
    #[serde(default)]
    pub healthy_codes: HealthyCodeRange,
}

impl TierConfig {
    pub fn liveness() -> Self {
        Self {
            name: LIVE_TIER.to_string(),
            path: "/health/live".to_string(),
            selector: ProbeSelector::None,
            status_codes: StatusCodeTable::default(),
            healthy_codes: HealthyCodeRange::default(),
        }
    }

    pub fn readiness() -> Self {
        Self {
            name: READY_TIER.to_string(),
            path: "/health/ready".to_string(),
            selector: ProbeSelector::Tag(READY_TAG.to_string()),
            status_codes: StatusCodeTable::default(),
            healthy_codes: HealthyCodeRange::default(),
        }
    }

    /// Environment variables that relocate this tier's route, in precedence
    /// order: `HEALTH_READY_URL`, then `healthReadyUrl`.
    pub fn route_env_keys(&self) -> [String; 2] {
        let mut camel = String::with_capacity(self.name.len());
        let mut upper_next = true;
        for c in self.name.chars() {
            if c == '_' || c == '-' {
                upper_next = true;
            } else if upper_next {
                camel.extend(c.to_uppercase());
                upper_next = false;
            } else {
                camel.push(c);
            }
        }

        [
            format!("HEALTH_{}_URL", self.name.to_uppercase().replace('-', "_")),
            format!("health{}Url", camel),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub failure_status: Option<HealthStatus>,
    pub check: ProbeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Static {
        status: HealthStatus,
        #[serde(default)]
        description: String,
    },
    Http {
        url: Url,
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        degraded_after_ms: Option<u64>,
    },
    Tcp {
        address: String,
    },
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

impl Config {
    /// Replace tier paths from the process environment.
    pub fn apply_route_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for tier in &mut self.tiers {
            let found = tier.route_env_keys().into_iter().find_map(|key| {
                lookup(&key)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (key, v))
            });

            if let Some((key, path)) = found {
                tracing::info!(tier = %tier.name, %key, %path, "Route overridden from environment");
                tier.path = path.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.evaluation.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }

        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for tier in &self.tiers {
            if !names.insert(tier.name.as_str()) {
                return Err(ConfigError::DuplicateTier(tier.name.clone()));
            }
            if !tier.path.starts_with('/') {
                return Err(ConfigError::InvalidPath {
                    tier: tier.name.clone(),
                    path: tier.path.clone(),
                });
            }
            if !paths.insert(tier.path.as_str()) {
                return Err(ConfigError::DuplicatePath(tier.path.clone()));
            }
            if tier.name == LIVE_TIER && tier.selector != ProbeSelector::None {
                return Err(ConfigError::LivenessSelectsProbes);
            }
            tier.validate_codes()?;
        }

        let mut probe_names = HashSet::new();
        for probe in &self.probes {
            if !probe_names.insert(probe.name.as_str()) {
                return Err(ConfigError::DuplicateProbe(probe.name.clone()));
            }
            if probe.failure_status == Some(HealthStatus::Healthy) {
                return Err(ConfigError::HealthyFailureStatus(probe.name.clone()));
            }
        }

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        Ok(())
    }
}

impl TierConfig {
    /// Healthy and Degraded must land inside the healthy range so a degraded
    /// instance stays in rotation; Unhealthy must land outside it.
    fn validate_codes(&self) -> Result<(), ConfigError> {
        let range = self.healthy_codes;
        for status in HealthStatus::ALL {
            let code = self.status_codes.code_for(status);
            if !(100..=599).contains(&code) {
                return Err(ConfigError::InvalidStatusCode {
                    tier: self.name.clone(),
                    status,
                    code,
                });
            }

            let inside = range.contains(code);
            let reason = match (status, inside) {
                (HealthStatus::Unhealthy, true) => "inside",
                (HealthStatus::Healthy | HealthStatus::Degraded, false) => "outside",
                _ => continue,
            };
            return Err(ConfigError::InconsistentCodes {
                tier: self.name.clone(),
                status,
                code,
                reason,
                min: range.min,
                max: range.max,
            });
        }
        Ok(())
    }
}
