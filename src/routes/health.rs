//! Liveness and build information

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub storage: &'static str,
    pub dev_mode: bool,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub built_at: &'static str,
    pub service: &'static str,
}

/// GET /health - 200 whenever the process is serving
pub fn health_check(state: &AppState) -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            healthy: true,
            version: env!("CARGO_PKG_VERSION"),
            storage: state.storage,
            dev_mode: state.dev_mode,
            uptime_seconds: state.started_at.elapsed().as_secs(),
        },
    )
}

/// GET /version
pub fn version_info() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("BAILIFF_COMMIT").unwrap_or("unknown"),
            built_at: option_env!("BAILIFF_BUILT_AT").unwrap_or("unknown"),
            service: "bailiff",
        },
    )
}
