// src/tier/mapper.rs
use super::TierPolicy;
use crate::health::HealthStatus;
use hyper::StatusCode;

/// Response code a tier answers with for an aggregate status.
pub fn map_status(policy: &TierPolicy, status: HealthStatus) -> StatusCode {
    let code = policy.status_codes.code_for(status);
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
