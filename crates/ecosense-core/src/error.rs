//! Unified error types for the ecosense core library.
//!
//! Each concern has its own error type ([`AuthError`], [`TransportError`],
//! [`ConfigError`]) and [`EcoSenseError`] wraps them for callers that just
//! want to know whether a poll produced fresh data.
//!
//! Missing or malformed per-device values are not errors; the derivations
//! in [`crate::radon`] return `Option` instead.
//!
//! # Example
//!
//! ```rust
//! use ecosense_core::error::{EcoSenseError, Result};
//! use ecosense_core::auth::AuthError;
//!
//! fn login(ok: bool) -> Result<()> {
//!     if !ok {
//!         return Err(AuthError::Rejected("Incorrect username or password.".into()).into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(login(false).unwrap_err().is_auth_error());
//! ```

use thiserror::Error;

pub use crate::auth::AuthError;
pub use crate::client::TransportError;
pub use crate::config::ConfigError;

/// The unified error type for all ecosense operations.
#[derive(Debug, Error)]
pub enum EcoSenseError {
    /// Credentials were rejected or the identity provider failed.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// The device API could not be reached or answered with an error.
    #[error("Device API request failed: {0}")]
    Transport(#[from] TransportError),

    /// Settings could not be loaded or are invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A specialized [`Result`] type for ecosense operations.
pub type Result<T> = std::result::Result<T, EcoSenseError>;

impl EcoSenseError {
    /// Returns `true` if this error came from the identity provider.
    #[inline]
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Returns `true` if this error came from the device API transport.
    #[inline]
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns an HTTP-appropriate status code for surfacing this error.
    ///
    /// Upstream failures map to 502 so they are not confused with faults
    /// in the server itself.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Authentication(AuthError::Unreachable(_)) => 503,
            Self::Authentication(_) | Self::Transport(_) => 502,
            Self::Config(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(err) => match err {
                AuthError::Rejected(_) => "AUTH_REJECTED",
                AuthError::Unreachable(_) => "AUTH_UNREACHABLE",
                AuthError::Provider { .. } => "AUTH_PROVIDER_ERROR",
                AuthError::MalformedResponse(_) => "AUTH_MALFORMED_RESPONSE",
                AuthError::TokenRejected => "AUTH_TOKEN_REJECTED",
            },
            Self::Transport(err) => match err {
                TransportError::Network(_) => "TRANSPORT_NETWORK",
                TransportError::Status { .. } => "TRANSPORT_STATUS",
                TransportError::Decode(_) => "TRANSPORT_DECODE",
                TransportError::InvalidUrl(_) => "TRANSPORT_INVALID_URL",
            },
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}
