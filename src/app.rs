// src/app.rs
//
// Startup wiring shared by the binary and the integration tests.
use crate::config::{Config, ProbeConfig, ProbeKind};
use crate::health::probes::{HttpProbe, StaticProbe, TcpProbe};
use crate::health::{HealthEvaluator, ProbeRegistry, RegisteredProbe};
use crate::metrics::MetricsCollector;
use crate::server::HealthRouter;
use crate::tier::TierPolicy;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

pub fn build_probe(config: &ProbeConfig) -> Result<RegisteredProbe> {
    let registered = match &config.check {
        ProbeKind::Static {
            status,
            description,
        } => RegisteredProbe::new(&config.name, StaticProbe::new(*status, description.clone())),
        ProbeKind::Http {
            url,
            timeout_ms,
            degraded_after_ms,
        } => {
            let mut probe = HttpProbe::new(url.clone(), Duration::from_millis(*timeout_ms))
                .with_context(|| format!("Failed to build probe '{}'", config.name))?;
            if let Some(ms) = degraded_after_ms {
                probe = probe.degraded_after(Duration::from_millis(*ms));
            }
            RegisteredProbe::new(&config.name, probe)
        }
        ProbeKind::Tcp { address } => RegisteredProbe::new(&config.name, TcpProbe::new(address)),
    };

    let registered = registered.with_tags(config.tags.iter().cloned());
    Ok(match config.failure_status {
        Some(status) => registered.with_failure_status(status),
        None => registered,
    })
}

/// Fails on the first duplicate name; the process must not start with a
/// misconfigured registry.
pub fn build_registry(probes: &[ProbeConfig]) -> Result<ProbeRegistry> {
    let mut registry = ProbeRegistry::new();
    for probe in probes {
        registry.register(build_probe(probe)?)?;
    }
    Ok(registry)
}

pub fn build_router(
    config: &Config,
    registry: Arc<ProbeRegistry>,
    metrics: Option<Arc<MetricsCollector>>,
) -> HealthRouter {
    let tiers: Vec<TierPolicy> = config.tiers.iter().cloned().map(Into::into).collect();

    let mut evaluator = HealthEvaluator::new(config.evaluation.timeout());
    if let Some(metrics) = &metrics {
        evaluator = evaluator.with_metrics(metrics.clone());
    }

    let router = HealthRouter::new(tiers, registry, evaluator);
    match metrics {
        Some(metrics) => router.with_metrics(metrics),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthStatus, RegistryError};

    #[test]
    fn test_default_config_builds() {
        let config = Config::default();
        let registry = build_registry(&config.probes).unwrap();

        assert_eq!(registry.list_by_tag("ready").len(), 1);

        let router = build_router(&config, Arc::new(registry), None);
        assert_eq!(router.tiers().len(), 2);
    }

    #[test]
    fn test_duplicate_probe_is_fatal() {
        let mut config = Config::default();
        config.probes.push(config.probes[0].clone());

        let err = build_registry(&config.probes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_failure_status_is_carried() {
        let mut config = Config::default();
        config.probes[0].failure_status = Some(HealthStatus::Unhealthy);

        let probe = build_probe(&config.probes[0]).unwrap();
        assert_eq!(probe.failure_status, HealthStatus::Unhealthy);

        config.probes[0].failure_status = None;
        let probe = build_probe(&config.probes[0]).unwrap();
        assert_eq!(probe.failure_status, HealthStatus::Unhealthy);
        assert!(probe.has_tag("ready"));
    }
}
