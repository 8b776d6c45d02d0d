// src/main.rs
use anyhow::{Context, Result};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use tiered_health::{
    app,
    config::{self, MetricsConfig},
    metrics::MetricsRegistry,
    server::ServerBuilder,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tiered_health=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path: PathBuf = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TIERED_HEALTH_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string())
        .into();

    info!("Loading configuration from: {}", config_path.display());
    let config = config::load_config(Some(config_path.as_path()))?;

    // Build the probe registry; a duplicate name stops startup here
    let registry = Arc::new(app::build_registry(&config.probes)?);
    info!("Registered {} health probes", registry.len());

    // Initialize metrics
    let metrics = if config.metrics.enabled {
        let metrics_registry = MetricsRegistry::new()?;
        let collector = metrics_registry.collector();
        let metrics_addr = config.server.metrics_addr(&config.metrics)?;
        start_metrics_server(metrics_addr, &config.metrics, metrics_registry).await?;
        Some(collector)
    } else {
        None
    };

    let router = app::build_router(&config, registry, metrics);
    for tier in router.tiers() {
        info!(
            tier = %tier.name,
            path = %tier.path,
            selector = ?tier.selector,
            "Serving health tier"
        );
    }

    // Start main server
    let addr = config.server.socket_addr()?;
    ServerBuilder::new(addr)
        .with_handler(router)
        .with_shutdown_grace(config.server.shutdown_grace())
        .bind()
        .await?
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn start_metrics_server(
    addr: SocketAddr,
    config: &MetricsConfig,
    registry: MetricsRegistry,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(config.path.clone());
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    let response = if req.uri().path() == path.as_str() {
                        Response::builder()
                            .status(StatusCode::OK)
                            .header("Content-Type", "text/plain; version=0.0.4")
                            .body(Body::from(registry.gather()))
                    } else {
                        Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Body::from("Not Found"))
                    };
                    Ok::<_, Infallible>(response.unwrap_or_else(|_| Response::new(Body::empty())))
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics listener on {}", addr))?
        .serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
