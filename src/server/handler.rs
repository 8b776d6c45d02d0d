// src/server/handler.rs
use crate::health::{AggregateReport, HealthEvaluator, ProbeRegistry};
use crate::metrics::MetricsCollector;
use crate::tier::{map_status, TierPolicy};
use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tower::Service;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Serves every configured tier from one service.
///
/// Each request is matched against the tier paths exactly once; the matching
/// tier's selector picks probes from the shared registry, the evaluator runs
/// them and the tier's table turns the aggregate into a response code.
#[derive(Clone)]
pub struct HealthRouter {
    tiers: Arc<Vec<TierPolicy>>,
    registry: Arc<ProbeRegistry>,
    evaluator: HealthEvaluator,
    metrics: Option<Arc<MetricsCollector>>,
}

#[derive(Serialize)]
struct TierReport<'a> {
    tier: &'a str,
    #[serde(flatten)]
    report: &'a AggregateReport,
}

impl HealthRouter {
    pub fn new(
        tiers: Vec<TierPolicy>,
        registry: Arc<ProbeRegistry>,
        evaluator: HealthEvaluator,
    ) -> Self {
        Self {
            tiers: Arc::new(tiers),
            registry,
            evaluator,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tiers(&self) -> &[TierPolicy] {
        &self.tiers
    }

    pub fn tier_for_path(&self, path: &str) -> Option<&TierPolicy> {
        self.tiers.iter().find(|t| t.path == path)
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let tier = match self.tier_for_path(req.uri().path()) {
            Some(tier) => tier,
            None => return plain(StatusCode::NOT_FOUND, "Not Found"),
        };

        let head_only = match *req.method() {
            Method::GET => false,
            Method::HEAD => true,
            _ => {
                let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
                return response;
            }
        };

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "health_request",
            tier = %tier.name,
            request_id = %request_id
        );

        self.evaluate_tier(tier, request_id, head_only)
            .instrument(span)
            .await
    }

    async fn evaluate_tier(
        &self,
        tier: &TierPolicy,
        request_id: Uuid,
        head_only: bool,
    ) -> Response<Body> {
        let started = Instant::now();
        let probes = self.registry.select(&tier.selector);
        let report = self.evaluator.evaluate(&probes).await;
        let code = map_status(tier, report.overall_status);

        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(&tier.name, report.overall_status, started.elapsed());
        }

        if report.is_healthy() {
            debug!(probes = probes.len(), code = code.as_u16(), "Tier healthy");
        } else {
            info!(
                status = %report.overall_status,
                probes = probes.len(),
                code = code.as_u16(),
                "Tier not healthy"
            );
        }

        let body = if head_only {
            Body::empty()
        } else {
            match serde_json::to_vec(&TierReport {
                tier: &tier.name,
                report: &report,
            }) {
                Ok(bytes) => Body::from(bytes),
                Err(e) => {
                    tracing::error!("Failed to serialize health report: {}", e);
                    Body::from(report.overall_status.as_str())
                }
            }
        };

        Response::builder()
            .status(code)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .body(body)
            .unwrap_or_else(|_| internal_error())
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from(message))
        .unwrap_or_else(|_| internal_error())
}

fn internal_error() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

impl Service<Request<Body>> for HealthRouter {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.handle(req).await) })
    }
}
