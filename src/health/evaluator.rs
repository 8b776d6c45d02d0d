// src/health/evaluator.rs
use super::probe::{cancel_pair, ProbeError};
use super::registry::RegisteredProbe;
use super::report::{AggregateReport, ReportEntry};
use super::status::ProbeResult;
use crate::metrics::MetricsCollector;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs a selection of probes concurrently and folds them into one report.
#[derive(Clone)]
pub struct HealthEvaluator {
    timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Aborts every tracked probe task when dropped, which covers both the normal
/// end of an evaluation and a request future dropped mid-flight.
#[derive(Default)]
struct InFlight(Vec<AbortHandle>);

impl InFlight {
    fn track(&mut self, handle: AbortHandle) {
        self.0.push(handle);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

impl HealthEvaluator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn evaluate(&self, probes: &[Arc<RegisteredProbe>]) -> AggregateReport {
        self.evaluate_with_timeout(probes, self.timeout).await
    }

    /// Each probe gets `limit` to finish. Probes run concurrently, so the
    /// whole evaluation is bounded by `limit` as well.
    pub async fn evaluate_with_timeout(
        &self,
        probes: &[Arc<RegisteredProbe>],
        limit: Duration,
    ) -> AggregateReport {
        let evaluated_at = Utc::now();
        let started = Instant::now();

        if probes.is_empty() {
            return AggregateReport::from_entries(Vec::new(), evaluated_at, started.elapsed());
        }

        let (cancel, signal) = cancel_pair();
        let mut in_flight = InFlight::default();
        let mut pending = Vec::with_capacity(probes.len());

        for registered in probes {
            let task_probe = registered.clone();
            let task_signal = signal.clone();
            let handle = tokio::spawn(async move { task_probe.probe.execute(task_signal).await });
            in_flight.track(handle.abort_handle());
            pending.push(self.await_probe(registered.clone(), handle, limit));
        }

        // join_all keeps input order, which is registration order
        let entries = futures::future::join_all(pending).await;

        cancel.cancel();
        drop(in_flight);

        AggregateReport::from_entries(entries, evaluated_at, started.elapsed())
    }

    async fn await_probe(
        &self,
        registered: Arc<RegisteredProbe>,
        handle: JoinHandle<Result<ProbeResult, ProbeError>>,
        limit: Duration,
    ) -> ReportEntry {
        let started = Instant::now();

        let outcome = match timeout(limit, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => Err(ProbeError::Panicked),
            Ok(Err(_)) => Err(ProbeError::Cancelled),
            Err(_) => Err(ProbeError::Timeout(limit)),
        };
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(result) => {
                debug!(
                    probe = %registered.name,
                    status = %result.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Probe completed"
                );
                result
            }
            Err(err) => {
                warn!(probe = %registered.name, error = %err, "Probe failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_probe_fault(&registered.name, err.kind());
                }
                ProbeResult::new(registered.failure_status, err.to_string())
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_probe(&registered.name, result.status, elapsed);
        }

        ReportEntry::new(&registered, result, elapsed)
    }
}
