//! OpenAPI specification generation for the ecosense API.
//!
//! The same document is served at `/api/openapi.json` and written to disk
//! by the `gen-openapi` binary for client generation.

use axum::Json;
use utoipa::OpenApi;

use super::config::{ConfigResponse, UpdateUnitRequest, UpdateUnitResponse};
use super::devices::{DevicesResponse, RefreshResponse};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use ecosense_core::{
    AlertLevel, DeviceInfo, DeviceView, PollStatus, RadonUnit, SensorKey, SensorState, SensorValue,
};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a pretty-printed string.
///
/// # Panics
///
/// Panics if the generated document cannot be serialized, which would be
/// a bug in the schema derives.
pub fn get_openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialize OpenAPI spec")
}

/// Main OpenAPI document structure for ecosense.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ecosense API",
        version = "0.1.0",
        description = r#"
# ecosense API

Latest readings from EcoSense radon monitors, polled from the EcoSense cloud.

## Overview

The server logs in to the EcoSense account, polls the device list on a
fixed interval, and serves the most recent successful result:

1. **Devices**: Each device exposes a radon level and an alert level
2. **Alert levels**: Green below the device's level2 threshold, Orange below
   level3, Red otherwise
3. **Units**: Readings arrive in Bq/m³ and are shown in pCi/L by default

If a poll fails, the previous readings keep being served and `/health`
reports `degraded`.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local ecosense server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks and poll status"
        ),
        (
            name = "devices",
            description = "Radon monitors and their current readings"
        ),
        (
            name = "config",
            description = "Account and display settings"
        )
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Device endpoints
        super::devices::list_devices,
        super::devices::get_device,
        super::devices::get_sensor,
        super::devices::refresh,
        // Config endpoints
        super::config::get_config,
        super::config::update_unit,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            PollStatus,
            // Device types
            DevicesResponse,
            RefreshResponse,
            DeviceView,
            DeviceInfo,
            SensorState,
            SensorKey,
            SensorValue,
            AlertLevel,
            // Config types
            RadonUnit,
            ConfigResponse,
            UpdateUnitRequest,
            UpdateUnitResponse,
        )
    )
)]
pub struct ApiDoc;
