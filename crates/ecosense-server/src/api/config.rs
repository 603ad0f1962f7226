//! Configuration API endpoints.
//!
//! Exposes the running settings (never the password) and lets the display
//! unit be changed. Unit changes live in memory and are lost on restart.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use ecosense_core::radon::UnknownUnit;
use ecosense_core::RadonUnit;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the config router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_config))
        .route("/unit", put(update_unit))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Current configuration response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "username": "me@example.com",
    "unit": "pCi/L",
    "unit_label": "pCi/L (Picocuries per Liter)",
    "poll_interval_secs": 300
}))]
pub struct ConfigResponse {
    /// Account the server polls for.
    #[schema(example = "me@example.com")]
    pub username: String,

    /// Display unit for radon readings.
    pub unit: RadonUnit,

    /// Long form of `unit` for selection lists.
    #[schema(example = "pCi/L (Picocuries per Liter)")]
    pub unit_label: String,

    /// Seconds between background polls.
    #[schema(example = 300)]
    pub poll_interval_secs: u64,
}

/// Request to change the display unit.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "unit": "Bq/m³"
}))]
pub struct UpdateUnitRequest {
    /// `pCi/L` or `Bq/m³` (also accepts `pcil` and `bqm3`).
    #[schema(example = "Bq/m³")]
    pub unit: String,
}

/// Response after changing the display unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateUnitResponse {
    /// Whether the update was successful.
    pub success: bool,

    /// Unit now in effect.
    pub unit: RadonUnit,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get current configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Get current configuration",
    description = "Returns the account, display unit, and poll interval. \
        The password is never returned.",
    responses(
        (status = 200, description = "Configuration retrieved", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let unit = state.unit().await;
    Json(ConfigResponse {
        username: state.username().to_string(),
        unit,
        unit_label: unit.label().to_string(),
        poll_interval_secs: state.poll_interval().as_secs(),
    })
}

/// Change the display unit.
#[utoipa::path(
    put,
    path = "/api/config/unit",
    tag = "config",
    operation_id = "updateUnit",
    summary = "Change the display unit",
    description = "Switches radon readings between pCi/L and Bq/m³. Takes \
        effect on the next read without re-polling.",
    request_body = UpdateUnitRequest,
    responses(
        (status = 200, description = "Unit updated", body = UpdateUnitResponse),
        (status = 400, description = "Unknown unit", body = super::error::ErrorResponse)
    )
)]
pub async fn update_unit(
    State(state): State<SharedState>,
    Json(request): Json<UpdateUnitRequest>,
) -> ApiResult<Json<UpdateUnitResponse>> {
    let unit: RadonUnit = request.unit.parse().map_err(|e: UnknownUnit| ApiError::BadRequest {
        error_code: "invalid_unit".to_string(),
        message: e.to_string(),
    })?;

    state.set_unit(unit).await;
    info!(%unit, "Display unit changed");

    Ok(Json(UpdateUnitResponse {
        success: true,
        unit,
    }))
}
