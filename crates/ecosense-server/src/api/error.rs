//! API error types and response handling.
//!
//! Every handler failure becomes an [`ApiError`], which renders as a JSON
//! [`ErrorResponse`] with a matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ecosense_core::EcoSenseError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - Unknown device or sensor.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 502 Bad Gateway - The EcoSense cloud failed or rejected us.
    BadGateway {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 503 Service Unavailable - No data yet, or the cloud is unreachable.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "device_not_found",
    "message": "No device with serial number 'SN9'"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "device_not_found")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "No device with serial number 'SN9'")]
    pub message: String,
}

impl ApiError {
    /// 404 for a serial number missing from the snapshot.
    pub fn device_not_found(serial_number: &str) -> Self {
        Self::NotFound {
            error_code: "device_not_found".to_string(),
            message: format!("No device with serial number '{serial_number}'"),
        }
    }

    /// 503 before the first successful poll.
    pub fn no_data() -> Self {
        Self::ServiceUnavailable {
            error_code: "no_data".to_string(),
            message: "No successful poll yet".to_string(),
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (Self::BadRequest { error_code, message }
        | Self::NotFound { error_code, message }
        | Self::InternalError { error_code, message }
        | Self::BadGateway { error_code, message }
        | Self::ServiceUnavailable { error_code, message }) = self;

        if status.is_server_error() {
            tracing::warn!(
                status = status.as_u16(),
                error_code = %error_code,
                message = %message,
                "Request failed"
            );
        }

        (
            status,
            Json(ErrorResponse {
                error: error_code,
                message,
            }),
        )
            .into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::BadGateway { message, .. } => write!(f, "Bad Gateway: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from ecosense_core errors.
impl From<EcoSenseError> for ApiError {
    fn from(err: EcoSenseError) -> Self {
        let error_code = err.error_code().to_lowercase();
        let message = err.to_string();

        match err.http_status_code() {
            503 => Self::ServiceUnavailable {
                error_code,
                message,
            },
            502 => Self::BadGateway {
                error_code,
                message,
            },
            _ => Self::InternalError {
                error_code,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosense_core::{AuthError, TransportError};

    #[test]
    fn test_bad_request_error() {
        let err = ApiError::BadRequest {
            error_code: "test_error".to_string(),
            message: "Test message".to_string(),
        };
        assert!(err.to_string().contains("Bad Request"));
    }

    #[test]
    fn test_upstream_errors_map_to_gateway_statuses() {
        let rejected = ApiError::from(EcoSenseError::from(AuthError::Rejected("nope".into())));
        assert_eq!(rejected.status(), StatusCode::BAD_GATEWAY);

        let unreachable = ApiError::from(EcoSenseError::from(AuthError::Unreachable("dns".into())));
        assert_eq!(unreachable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let status = ApiError::from(EcoSenseError::from(TransportError::Status {
            status: 500,
            body: "boom".into(),
        }));
        assert!(matches!(
            status,
            ApiError::BadGateway { ref error_code, .. } if error_code == "transport_status"
        ));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "device_not_found".to_string(),
            message: "Test message".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("device_not_found"));
    }
}
