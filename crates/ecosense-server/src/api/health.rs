//! Health check API endpoint.
//!
//! Reports liveness together with the outcome of recent polls, so a
//! monitor can tell a healthy server with a failing upstream apart from a
//! dead one.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ecosense_core::PollStatus;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "poll": {
        "last_success_utc": "2026-01-15T10:30:00Z",
        "last_failure_utc": null,
        "last_error": null,
        "consecutive_failures": 0,
        "device_count": 2
    }
}))]
pub struct HealthResponse {
    /// `ok` when the last poll succeeded, `degraded` otherwise.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Poll loop bookkeeping.
    pub poll: PollStatus,
}

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns the service version and the outcome of recent polls. \
        The server itself is up whenever this answers; `degraded` means the \
        EcoSense cloud has been failing and readings may be stale.",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let poll = state.coordinator().status().await;
    let status = if poll.consecutive_failures == 0 && poll.last_success_utc.is_some() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        poll,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            poll: PollStatus::default(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"consecutive_failures\":0"));
    }
}
