// src/tier/policy.rs
use crate::config::{HealthyCodeRange, ProbeSelector, StatusCodeTable, TierConfig};
use crate::health::HealthStatus;
use std::collections::BTreeSet;

/// A health-check audience: which probes it runs, where it is served and how
/// its aggregate status turns into a response code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPolicy {
    pub name: String,
    pub path: String,
    pub selector: ProbeSelector,
    pub status_codes: StatusCodeTable,
    pub healthy_codes: HealthyCodeRange,
}

impl TierPolicy {
    pub fn liveness() -> Self {
        TierConfig::liveness().into()
    }

    pub fn readiness() -> Self {
        TierConfig::readiness().into()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_status_codes(mut self, codes: StatusCodeTable) -> Self {
        self.status_codes = codes;
        self
    }
}

impl From<TierConfig> for TierPolicy {
    fn from(config: TierConfig) -> Self {
        Self {
            name: config.name,
            path: config.path,
            selector: config.selector,
            status_codes: config.status_codes,
            healthy_codes: config.healthy_codes,
        }
    }
}

impl ProbeSelector {
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        match self {
            ProbeSelector::None => false,
            ProbeSelector::All => true,
            ProbeSelector::Tag(tag) => tags.contains(tag),
            ProbeSelector::AnyTag(wanted) => wanted.iter().any(|t| tags.contains(t)),
        }
    }
}

impl StatusCodeTable {
    pub fn code_for(&self, status: HealthStatus) -> u16 {
        match status {
            HealthStatus::Healthy => self.healthy,
            HealthStatus::Degraded => self.degraded,
            HealthStatus::Unhealthy => self.unhealthy,
        }
    }
}

impl HealthyCodeRange {
    pub fn contains(&self, code: u16) -> bool {
        (self.min..=self.max).contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_selector_matching() {
        let ready = tags(&["ready", "db"]);

        assert!(!ProbeSelector::None.matches(&ready));
        assert!(ProbeSelector::All.matches(&tags(&[])));
        assert!(ProbeSelector::Tag("ready".into()).matches(&ready));
        assert!(!ProbeSelector::Tag("startup".into()).matches(&ready));
        assert!(ProbeSelector::AnyTag(vec!["startup".into(), "db".into()]).matches(&ready));
    }

    #[test]
    fn test_default_policies() {
        let live = TierPolicy::liveness();
        assert_eq!(live.name, "live");
        assert_eq!(live.selector, ProbeSelector::None);

        let ready = TierPolicy::readiness();
        assert_eq!(ready.path, "/health/ready");
        assert_eq!(ready.status_codes.code_for(HealthStatus::Degraded), 207);
    }

    #[test]
    fn test_healthy_range_is_inclusive() {
        let range = HealthyCodeRange::default();
        assert!(range.contains(200));
        assert!(range.contains(299));
        assert!(!range.contains(300));
        assert!(!range.contains(503));
    }
}
