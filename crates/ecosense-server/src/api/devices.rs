//! Device and sensor API endpoints.
//!
//! Readings come from the coordinator's latest snapshot and are rendered
//! in the current unit preference on every request.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ecosense_core::{read_sensor, DeviceView, SensorKey, SensorState};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the devices router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_devices))
        .route("/{serial}", get(get_device))
        .route("/{serial}/sensors/{key}", get(get_sensor))
}

/// Creates the refresh router.
pub fn refresh_router() -> Router<SharedState> {
    Router::new().route("/", post(refresh))
}

// ============================================================================
// Response Types
// ============================================================================

/// Every device in the latest snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DevicesResponse {
    /// When the snapshot was fetched.
    pub fetched_at: DateTime<Utc>,

    /// Devices in API order.
    pub devices: Vec<DeviceView>,
}

/// Result of a manual refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "fetched_at": "2026-01-15T10:30:00Z",
    "device_count": 2
}))]
pub struct RefreshResponse {
    /// When the new snapshot was fetched.
    pub fetched_at: DateTime<Utc>,

    /// Devices in the new snapshot.
    #[schema(example = 2)]
    pub device_count: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all devices.
#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "devices",
    operation_id = "listDevices",
    summary = "List devices with current readings",
    description = "Returns every device on the account with its metadata and \
        both sensors (radon level and alert level) from the latest poll.",
    responses(
        (status = 200, description = "Latest readings", body = DevicesResponse),
        (status = 503, description = "No successful poll yet", body = super::error::ErrorResponse)
    )
)]
pub async fn list_devices(State(state): State<SharedState>) -> ApiResult<Json<DevicesResponse>> {
    let snapshot = state.coordinator().snapshot().await.ok_or_else(ApiError::no_data)?;
    let unit = state.unit().await;

    Ok(Json(DevicesResponse {
        fetched_at: snapshot.fetched_at,
        devices: snapshot
            .devices
            .iter()
            .map(|record| DeviceView::from_record(record, unit))
            .collect(),
    }))
}

/// Get one device.
#[utoipa::path(
    get,
    path = "/api/devices/{serial}",
    tag = "devices",
    operation_id = "getDevice",
    summary = "Get one device",
    params(
        ("serial" = String, Path, description = "Device serial number")
    ),
    responses(
        (status = 200, description = "Device found", body = DeviceView),
        (status = 404, description = "Unknown serial number", body = super::error::ErrorResponse),
        (status = 503, description = "No successful poll yet", body = super::error::ErrorResponse)
    )
)]
pub async fn get_device(
    State(state): State<SharedState>,
    Path(serial): Path<String>,
) -> ApiResult<Json<DeviceView>> {
    let snapshot = state.coordinator().snapshot().await.ok_or_else(ApiError::no_data)?;
    let record = snapshot
        .device(&serial)
        .ok_or_else(|| ApiError::device_not_found(&serial))?;

    Ok(Json(DeviceView::from_record(record, state.unit().await)))
}

/// Get one sensor of one device.
#[utoipa::path(
    get,
    path = "/api/devices/{serial}/sensors/{key}",
    tag = "devices",
    operation_id = "getSensor",
    summary = "Get one sensor",
    description = "Returns a single sensor state. `key` is `radon_level` or `alert_level`.",
    params(
        ("serial" = String, Path, description = "Device serial number"),
        ("key" = String, Path, description = "Sensor key")
    ),
    responses(
        (status = 200, description = "Sensor state", body = SensorState),
        (status = 404, description = "Unknown serial number or sensor", body = super::error::ErrorResponse),
        (status = 503, description = "No successful poll yet", body = super::error::ErrorResponse)
    )
)]
pub async fn get_sensor(
    State(state): State<SharedState>,
    Path((serial, key)): Path<(String, String)>,
) -> ApiResult<Json<SensorState>> {
    let key: SensorKey = key.parse().map_err(|message| ApiError::NotFound {
        error_code: "sensor_not_found".to_string(),
        message,
    })?;

    let snapshot = state.coordinator().snapshot().await.ok_or_else(ApiError::no_data)?;
    let record = snapshot
        .device(&serial)
        .ok_or_else(|| ApiError::device_not_found(&serial))?;

    Ok(Json(read_sensor(&serial, key, Some(record), state.unit().await)))
}

/// Poll the EcoSense cloud now.
#[utoipa::path(
    post,
    path = "/api/refresh",
    tag = "devices",
    operation_id = "refresh",
    summary = "Refresh readings now",
    description = "Runs a poll immediately, waiting for any poll already in \
        progress. On failure the previous readings are kept and served.",
    responses(
        (status = 200, description = "Poll succeeded", body = RefreshResponse),
        (status = 502, description = "EcoSense cloud failed", body = super::error::ErrorResponse),
        (status = 503, description = "EcoSense cloud unreachable", body = super::error::ErrorResponse)
    )
)]
pub async fn refresh(State(state): State<SharedState>) -> ApiResult<Json<RefreshResponse>> {
    info!("Manual refresh requested");
    let snapshot = state.coordinator().refresh().await?;

    Ok(Json(RefreshResponse {
        fetched_at: snapshot.fetched_at,
        device_count: snapshot.devices.len(),
    }))
}
