// src/metrics/collector.rs
use crate::health::HealthStatus;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Tier metrics
    pub evaluations_total: IntCounterVec,
    pub evaluation_duration_seconds: HistogramVec,
    pub tier_status: IntGaugeVec,

    // Probe metrics
    pub probe_executions_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub probe_faults_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let evaluations_total = IntCounterVec::new(
            Opts::new("health_evaluations_total", "Health evaluations per tier and outcome"),
            &["tier", "status"],
        )?;
        registry.register(Box::new(evaluations_total.clone()))?;

        let evaluation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_evaluation_duration_seconds",
                "Time spent evaluating a tier",
            ),
            &["tier"],
        )?;
        registry.register(Box::new(evaluation_duration_seconds.clone()))?;

        let tier_status = IntGaugeVec::new(
            Opts::new(
                "health_tier_status",
                "Last aggregate status per tier (0=healthy, 1=degraded, 2=unhealthy)",
            ),
            &["tier"],
        )?;
        registry.register(Box::new(tier_status.clone()))?;

        let probe_executions_total = IntCounterVec::new(
            Opts::new("health_probe_executions_total", "Probe executions per outcome"),
            &["probe", "status"],
        )?;
        registry.register(Box::new(probe_executions_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new("health_probe_duration_seconds", "Probe execution time"),
            &["probe"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let probe_faults_total = IntCounterVec::new(
            Opts::new(
                "health_probe_faults_total",
                "Probe executions that failed, timed out or panicked",
            ),
            &["probe", "kind"],
        )?;
        registry.register(Box::new(probe_faults_total.clone()))?;

        Ok(Self {
            evaluations_total,
            evaluation_duration_seconds,
            tier_status,
            probe_executions_total,
            probe_duration_seconds,
            probe_faults_total,
        })
    }

    pub fn record_evaluation(&self, tier: &str, status: HealthStatus, duration: Duration) {
        self.evaluations_total
            .with_label_values(&[tier, status.as_str()])
            .inc();

        self.evaluation_duration_seconds
            .with_label_values(&[tier])
            .observe(duration.as_secs_f64());

        let value = match status {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        };
        self.tier_status.with_label_values(&[tier]).set(value);
    }

    pub fn record_probe(&self, probe: &str, status: HealthStatus, duration: Duration) {
        self.probe_executions_total
            .with_label_values(&[probe, status.as_str()])
            .inc();

        self.probe_duration_seconds
            .with_label_values(&[probe])
            .observe(duration.as_secs_f64());
    }

    pub fn record_probe_fault(&self, probe: &str, kind: &str) {
        self.probe_faults_total
            .with_label_values(&[probe, kind])
            .inc();
    }
}
