//! Health and version endpoints
//!
//! - /health, /healthz - liveness, with uptime and store backend
//! - /version - build information from `build.rs`

use hyper::StatusCode;
use serde::Serialize;

use crate::routes::common::{json_response, HttpResponse};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime: u64,
    pub timestamp: String,
    /// `development` or `production`
    pub mode: &'static str,
    /// `mongodb` or `memory`
    pub store: &'static str,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        store: state.ctx.stores.backend(),
    }
}

pub fn health_check(state: &AppState) -> HttpResponse {
    json_response(StatusCode::OK, &build_health_response(state))
}

/// Build stamp served by `GET /version`
#[derive(Serialize)]
pub struct VersionResponse {
    pub service: &'static str,
    pub version: &'static str,
    /// `git describe` output or `SOURCE_COMMIT`
    pub revision: &'static str,
    pub built_at: &'static str,
}

pub fn version_info() -> HttpResponse {
    let response = VersionResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        revision: env!("QUIRE_REVISION"),
        built_at: env!("QUIRE_BUILT_AT"),
    };
    json_response(StatusCode::OK, &response)
}
