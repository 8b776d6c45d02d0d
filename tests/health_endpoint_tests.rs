// tests/health_endpoint_tests.rs
use async_trait::async_trait;
use hyper::{Body, Request, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiered_health::app;
use tiered_health::config::{Config, ProbeConfig, ProbeKind};
use tiered_health::health::probes::StaticProbe;
use tiered_health::health::{
    CancelSignal, HealthEvaluator, HealthProbe, HealthStatus, ProbeError, ProbeRegistry,
    ProbeResult, RegisteredProbe,
};
use tiered_health::server::{HealthRouter, ServerBuilder};
use tiered_health::tier::TierPolicy;
use tower::ServiceExt;

struct SleepyProbe(Duration);

#[async_trait]
impl HealthProbe for SleepyProbe {
    async fn execute(&self, _cancel: CancelSignal) -> Result<ProbeResult, ProbeError> {
        tokio::time::sleep(self.0).await;
        Ok(ProbeResult::healthy("woke up"))
    }
}

struct CountingProbe(Arc<AtomicUsize>);

#[async_trait]
impl HealthProbe for CountingProbe {
    async fn execute(&self, _cancel: CancelSignal) -> Result<ProbeResult, ProbeError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(ProbeResult::unhealthy("dependency down"))
    }
}

fn router_with(registry: ProbeRegistry, timeout: Duration) -> HealthRouter {
    HealthRouter::new(
        vec![TierPolicy::liveness(), TierPolicy::readiness()],
        Arc::new(registry),
        HealthEvaluator::new(timeout),
    )
}

fn ready_probe<P: HealthProbe + 'static>(name: &str, probe: P) -> RegisteredProbe {
    RegisteredProbe::new(name, probe).with_tag("ready")
}

async fn get(router: &HealthRouter, path: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::get(path).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn liveness_ignores_failing_ready_probes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ProbeRegistry::new();
    registry
        .register(ready_probe("db", CountingProbe(calls.clone())))
        .unwrap();
    registry
        .register(ready_probe(
            "queue",
            StaticProbe::new(HealthStatus::Unhealthy, "down"),
        ))
        .unwrap();

    let router = router_with(registry, Duration::from_secs(1));
    let (status, body) = get(&router, "/health/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tier"], "live");
    assert!(body["entries"].as_array().unwrap().is_empty());
    // the liveness tier never touches dependency probes
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn readiness_reports_degraded_as_207() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(ready_probe("a", StaticProbe::healthy("ok")))
        .unwrap();
    registry
        .register(ready_probe(
            "b",
            StaticProbe::new(HealthStatus::Degraded, "slow"),
        ))
        .unwrap();
    registry
        .register(ready_probe("c", StaticProbe::healthy("ok")))
        .unwrap();

    let router = router_with(registry, Duration::from_secs(1));
    let (status, body) = get(&router, "/health/ready").await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["status"], "degraded");
    let names: Vec<_> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn readiness_times_out_to_503_within_bound() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(ready_probe("stuck", SleepyProbe(Duration::from_secs(60))))
        .unwrap();

    let router = router_with(registry, Duration::from_millis(100));
    let started = Instant::now();
    let (status, body) = get(&router, "/health/ready").await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert!(body["entries"][0]["description"]
        .as_str()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn readiness_skips_untagged_probes() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(RegisteredProbe::new(
            "background-only",
            StaticProbe::new(HealthStatus::Unhealthy, "down"),
        ))
        .unwrap();

    let router = router_with(registry, Duration::from_secs(1));
    let (status, body) = get(&router, "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn each_request_evaluates_afresh() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ProbeRegistry::new();
    registry
        .register(ready_probe("db", CountingProbe(calls.clone())))
        .unwrap();

    let router = router_with(registry, Duration::from_secs(1));
    for _ in 0..3 {
        let (status, _) = get(&router, "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn startup_tier_is_configuration_only() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(
            RegisteredProbe::new("migrations", StaticProbe::new(HealthStatus::Degraded, "pending"))
                .with_tag("startup"),
        )
        .unwrap();

    let startup = TierPolicy {
        name: "startup".into(),
        path: "/health/startup".into(),
        selector: tiered_health::tier::ProbeSelector::Tag("startup".into()),
        ..TierPolicy::readiness()
    };
    let router = HealthRouter::new(
        vec![TierPolicy::liveness(), TierPolicy::readiness(), startup],
        Arc::new(registry),
        HealthEvaluator::new(Duration::from_secs(1)),
    );

    let (status, body) = get(&router, "/health/startup").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["tier"], "startup");

    let (status, _) = get(&router, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn overridden_routes_are_served_over_http() {
    let mut config = Config::default();
    config.apply_route_overrides(|key| match key {
        "healthLiveUrl" => Some("/livez".to_string()),
        "HEALTH_READY_URL" => Some("/readyz".to_string()),
        _ => None,
    });
    config.probes.push(ProbeConfig {
        name: "cache".into(),
        tags: vec!["ready".into()],
        failure_status: None,
        check: ProbeKind::Static {
            status: HealthStatus::Unhealthy,
            description: "cache unreachable".into(),
        },
    });
    config.validate().unwrap();

    let registry = Arc::new(app::build_registry(&config.probes).unwrap());
    let router = app::build_router(&config, registry, None);

    let server = ServerBuilder::new(([127, 0, 0, 1], 0).into())
        .with_handler(router)
        .with_shutdown_grace(Duration::from_secs(1))
        .bind()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let live = client
        .get(format!("http://{}/livez", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(live.status().as_u16(), 200);

    let ready = client
        .get(format!("http://{}/readyz", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status().as_u16(), 503);
    assert!(ready.headers().contains_key("x-request-id"));
    let body: serde_json::Value = ready.json().await.unwrap();
    assert_eq!(body["entries"][1]["description"], "cache unreachable");

    let old = client
        .get(format!("http://{}/health/ready", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status().as_u16(), 404);

    stop_tx.send(()).unwrap();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_drains_in_flight_request() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(ready_probe("slow", SleepyProbe(Duration::from_millis(300))))
        .unwrap();
    let router = router_with(registry, Duration::from_secs(2));

    let server = ServerBuilder::new(([127, 0, 0, 1], 0).into())
        .with_handler(router)
        .with_shutdown_grace(Duration::from_secs(2))
        .bind()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = stop_rx.await;
    }));

    let in_flight = tokio::spawn(async move {
        reqwest::get(format!("http://{}/health/ready", addr))
            .await
            .map(|r| r.status().as_u16())
    });

    // let the request reach the probe before shutting down
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    assert_eq!(in_flight.await.unwrap().unwrap(), 200);
    serving.await.unwrap().unwrap();

    // the listener is gone once serving returns
    let refused = reqwest::Client::new()
        .get(format!("http://{}/health/live", addr))
        .send()
        .await;
    assert!(refused.is_err());
}
