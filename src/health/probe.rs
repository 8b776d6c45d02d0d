// src/health/probe.rs
use super::status::ProbeResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A unit of health evaluation logic.
///
/// Implementations should watch `cancel` when they do anything slow; the
/// evaluator abandons executions that outlive the evaluation timeout or the
/// inbound request.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn execute(&self, cancel: CancelSignal) -> Result<ProbeResult, ProbeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("probe failed: {0}")]
    Execution(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe cancelled")]
    Cancelled,

    #[error("probe panicked")]
    Panicked,
}

impl ProbeError {
    /// Label used for the fault counter.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Execution(_) => "execution",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Cancelled => "cancelled",
            ProbeError::Panicked => "panic",
        }
    }
}

/// Receiving side of a per-evaluation cancellation flag.
///
/// Dropping the matching [`CancelHandle`] counts as cancellation, so a probe
/// whose evaluation was abandoned sees the signal even if nobody called
/// [`CancelHandle::cancel`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    // holds the sender open for signals that are never cancelled
    _pinned: Option<Arc<watch::Sender<bool>>>,
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx, _pinned: None })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _pinned: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the evaluation is cancelled.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
