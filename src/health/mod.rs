// src/health/mod.rs
mod evaluator;
mod probe;
pub mod probes;
mod registry;
mod report;
mod status;

pub use evaluator::HealthEvaluator;
pub use probe::{cancel_pair, CancelHandle, CancelSignal, HealthProbe, ProbeError};
pub use registry::{ProbeRegistry, RegisteredProbe, RegistryError};
pub use report::{AggregateReport, ReportEntry};
pub use status::{HealthStatus, ProbeResult};
