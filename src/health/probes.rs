// src/health/probes.rs
//
// Built-in probes that can be declared from configuration.
use super::probe::{CancelSignal, HealthProbe, ProbeError};
use super::status::{HealthStatus, ProbeResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use url::Url;

/// Always reports the same result. Useful as an "application is wired up"
/// check and in tests.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    result: ProbeResult,
}

impl StaticProbe {
    pub fn new(status: HealthStatus, description: impl Into<String>) -> Self {
        Self {
            result: ProbeResult::new(status, description),
        }
    }

    pub fn healthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy, description)
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn execute(&self, _cancel: CancelSignal) -> Result<ProbeResult, ProbeError> {
        Ok(self.result.clone())
    }
}

/// GETs a URL. 2xx is healthy, or degraded when slower than the threshold;
/// anything else is unhealthy.
pub struct HttpProbe {
    url: Url,
    client: Client,
    degraded_after: Option<Duration>,
}

impl HttpProbe {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProbeError::Execution(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            client,
            degraded_after: None,
        })
    }

    pub fn degraded_after(mut self, threshold: Duration) -> Self {
        self.degraded_after = Some(threshold);
        self
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn execute(&self, mut cancel: CancelSignal) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();

        let response = tokio::select! {
            response = self.client.get(self.url.as_str()).send() => response,
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match response {
            Ok(response) => {
                let status = response.status();
                let result = if !status.is_success() {
                    ProbeResult::unhealthy(format!("{} returned HTTP {}", self.url, status))
                } else if self
                    .degraded_after
                    .map_or(false, |limit| start.elapsed() > limit)
                {
                    ProbeResult::degraded(format!("{} responding slowly", self.url))
                } else {
                    ProbeResult::healthy(format!("{} is reachable", self.url))
                };
                result.with_data("status_code", status.as_u16())
            }
            Err(e) if e.is_timeout() => {
                ProbeResult::unhealthy(format!("{} request timed out", self.url))
            }
            Err(e) => ProbeResult::unhealthy(format!("{} request failed: {}", self.url, e)),
        };

        Ok(result
            .with_data("url", &self.url)
            .with_data("response_time_ms", elapsed_ms))
    }
}

/// Opens a TCP connection to `address` and closes it again.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn execute(&self, mut cancel: CancelSignal) -> Result<ProbeResult, ProbeError> {
        let start = Instant::now();

        let connected = tokio::select! {
            connected = TcpStream::connect(self.address.as_str()) => connected,
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
        };

        let result = match connected {
            Ok(_stream) => ProbeResult::healthy(format!("connected to {}", self.address)),
            Err(e) => ProbeResult::unhealthy(format!("cannot connect to {}: {}", self.address, e)),
        };

        Ok(result
            .with_data("address", &self.address)
            .with_data("response_time_ms", start.elapsed().as_millis() as u64))
    }
}
