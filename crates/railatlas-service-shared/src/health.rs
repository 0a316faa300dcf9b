//! Health check handlers for liveness/readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Probe response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: <reason>".
    pub status: String,
    pub service: String,
    pub version: String,

    /// Whether the data directory is reachable (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_root_ready: Option<bool>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            data_root_ready: None,
        }
    }

    pub fn ready(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            data_root_ready: Some(true),
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {reason}"),
            service: service.to_string(),
            version: version.to_string(),
            data_root_ready: Some(false),
        }
    }
}

/// Liveness probe: the process is up. Never checks external resources.
pub async fn health_live(State(state): State<AppState>) -> Response {
    Json(HealthStatus::alive(state.service, state.version)).into_response()
}

/// Readiness probe: 200 when the data directory is reachable, 503 otherwise.
pub async fn health_ready(State(state): State<AppState>) -> Response {
    if state.data_root_ready() {
        Json(HealthStatus::ready(state.service, state.version)).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus::not_ready(
                state.service,
                state.version,
                "data directory unavailable",
            )),
        )
            .into_response()
    }
}
