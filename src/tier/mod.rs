// src/tier/mod.rs
mod mapper;
mod policy;

pub use mapper::map_status;
pub use policy::TierPolicy;
pub use crate::config::{HealthyCodeRange, ProbeSelector, StatusCodeTable};
