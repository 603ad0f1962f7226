//! HTTP API routes and handlers.
//!
//! - `devices` - Device listing, sensor reads, and manual refresh
//! - `config` - Running configuration and unit preference
//! - `health` - Service health and poll status
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod config;
pub mod devices;
pub mod error;
pub mod health;
pub mod openapi;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                              - Health check
/// /api
/// ├── /devices                         - All devices
/// ├── /devices/{serial}                - One device
/// ├── /devices/{serial}/sensors/{key}  - One sensor
/// ├── /refresh                         - Poll now
/// ├── /config                          - Configuration and unit preference
/// └── /openapi.json                    - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/devices", devices::router())
                .nest("/refresh", devices::refresh_router())
                .nest("/config", config::router()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
