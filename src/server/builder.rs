// src/server/builder.rs
use anyhow::{Context, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::Service;
use tracing::{debug, error, info, warn};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Builder pattern so `main.rs` can inject the health router (or any handler).
pub struct ServerBuilder<H> {
    addr: SocketAddr,
    handler: Option<H>,
    shutdown_grace: Duration,
}

/// A bound listener ready to accept connections.
pub struct Server<H> {
    listener: TcpListener,
    handler: H,
    shutdown_grace: Duration,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// How long in-flight connections may keep running after shutdown starts.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub async fn bind(self) -> Result<Server<H>> {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;

        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;

        Ok(Server {
            listener,
            handler,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

impl<H> Server<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves, then let open
    /// connections finish their current request within the grace period.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!("HTTP server listening on {}", addr);

        let (drain_tx, drain_rx) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) if is_connection_error(&err) => {
                            debug!(%err, "peer dropped before accept");
                            continue;
                        }
                        Err(err) => {
                            // e.g. EMFILE; retrying at once would spin
                            error!(%err, "accept failed, backing off for {:?}", ACCEPT_BACKOFF);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };
                    let svc = self.handler.clone();
                    let mut drain = drain_rx.clone();

                    // One Tokio task per connection.
                    tokio::spawn(async move {
                        let conn = Http::new().serve_connection(stream, svc);
                        tokio::pin!(conn);
                        let mut draining = false;

                        loop {
                            tokio::select! {
                                res = conn.as_mut() => {
                                    if let Err(err) = res {
                                        warn!(%peer, %err, "connection error");
                                    }
                                    break;
                                }
                                _ = drain.changed(), if !draining => {
                                    draining = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        }
                    });
                }
                _ = &mut shutdown => break,
            }
        }

        info!("Stopped accepting connections, draining");
        drop(self.listener);
        drop(drain_rx);
        let _ = drain_tx.send(true);

        if tokio::time::timeout(self.shutdown_grace, drain_tx.closed())
            .await
            .is_err()
        {
            warn!(
                "Connections still open after {:?}, shutting down anyway",
                self.shutdown_grace
            );
        }

        Ok(())
    }

    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }
}

/// Errors that only concern the one connection being accepted.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
