//! Device data client.
//!
//! [`DeviceClient`] owns the credentials and the [`Session`], fetches the
//! device list, and recovers from an expired token by logging in again
//! exactly once per fetch.
//!
//! # Retry policy
//!
//! A fetch re-authenticates and retries once when:
//! - the device API answers 401,
//! - the request fails before any response arrives (connect error,
//!   timeout),
//! - the session has no usable token (never logged in or known expired);
//!   here the login happens before the first request.
//!
//! Any other status and undecodable bodies fail immediately. A fetch
//! never performs more than one login or more than two requests.

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::auth::{AuthError, CognitoProvider, Credentials, IdentityProvider, Session};
use crate::config::Settings;
use crate::error::Result;
use crate::types::DeviceRecord;

/// Longest error body kept in a [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Errors raised while talking to the device API.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request did not produce a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a non-success status other than 401.
    #[error("Device API returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The body was not a JSON array.
    #[error("Could not decode device list: {0}")]
    Decode(String),

    /// The request URL could not be built.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Outcome of a single device-list request.
enum RequestFailure {
    /// HTTP 401.
    Unauthorized,
    /// No response was obtained.
    Network(reqwest::Error),
    /// Anything not worth a retry.
    Fatal(TransportError),
}

/// Build the HTTP client shared by the identity provider and the device API.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(
    timeout: std::time::Duration,
) -> std::result::Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ecosense/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))
}

/// Client for the EcoSense device-list endpoint.
///
/// Methods take `&mut self`: the session is mutated by re-authentication,
/// so callers sharing a client must serialize access.
pub struct DeviceClient<P = CognitoProvider> {
    http: reqwest::Client,
    api_url: Url,
    credentials: Credentials,
    provider: P,
    session: Session,
}

impl DeviceClient<CognitoProvider> {
    /// Build a client for the real EcoSense cloud from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the identity
    /// endpoint is invalid.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = build_http_client(settings.provider.request_timeout())?;
        let provider = CognitoProvider::from_config(http.clone(), &settings.provider)?;
        Ok(Self::new(
            http,
            settings.provider.api_url.clone(),
            Credentials::new(settings.username.clone(), settings.password.clone()),
            provider,
        ))
    }
}

impl<P: IdentityProvider> DeviceClient<P> {
    /// Create an unauthenticated client.
    pub fn new(http: reqwest::Client, api_url: Url, credentials: Credentials, provider: P) -> Self {
        Self {
            http,
            api_url,
            credentials,
            provider,
            session: Session::Unauthenticated,
        }
    }

    /// Current session state.
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Account the client fetches devices for.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// Log in and replace the session with fresh tokens.
    ///
    /// Always performs a round trip to the identity provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the identity
    /// provider cannot be reached. The previous session is kept.
    #[instrument(skip(self), fields(username = %self.credentials.username()))]
    pub async fn authenticate(&mut self) -> std::result::Result<(), AuthError> {
        info!("Authenticating with identity provider");
        let tokens = self.provider.login(&self.credentials).await?;
        self.session = Session::Authenticated(tokens);
        Ok(())
    }

    /// Check that the credentials work, for onboarding.
    ///
    /// # Errors
    ///
    /// Returns the login failure.
    pub async fn validate(&mut self) -> std::result::Result<(), AuthError> {
        match self.authenticate().await {
            Ok(()) => {
                info!("Credentials validated");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Cannot connect with the supplied credentials");
                Err(err)
            }
        }
    }

    /// Fetch every device on the account.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EcoSenseError::Authentication`] when logging in
    /// fails or a fresh token is still refused, and
    /// [`crate::EcoSenseError::Transport`] for every other failure.
    #[instrument(skip(self), fields(username = %self.credentials.username()))]
    pub async fn fetch_devices(&mut self) -> Result<Vec<DeviceRecord>> {
        let token = match self.session.bearer(Utc::now()) {
            Ok(token) => token.to_owned(),
            Err(reason) => {
                debug!(?reason, "No usable token, logging in before requesting");
                self.authenticate().await?;
                return self.final_attempt().await;
            }
        };

        match self.request(&token).await {
            Ok(devices) => Ok(devices),
            Err(RequestFailure::Unauthorized) => {
                warn!("Device API returned 401, re-authenticating and retrying once");
                self.authenticate().await?;
                self.final_attempt().await
            }
            Err(RequestFailure::Network(err)) => {
                warn!(
                    error = %err,
                    "Request failed before a response, re-authenticating and retrying once"
                );
                self.authenticate().await?;
                self.final_attempt().await
            }
            Err(RequestFailure::Fatal(err)) => Err(err.into()),
        }
    }

    /// The last request of a fetch: every failure is surfaced.
    async fn final_attempt(&self) -> Result<Vec<DeviceRecord>> {
        // A fresh login handed out an already expired token.
        let Ok(token) = self.session.bearer(Utc::now()) else {
            return Err(AuthError::MalformedResponse("token expired on issue".into()).into());
        };

        match self.request(token).await {
            Ok(devices) => Ok(devices),
            Err(RequestFailure::Unauthorized) => Err(AuthError::TokenRejected.into()),
            Err(RequestFailure::Network(err)) => {
                Err(TransportError::Network(err.to_string()).into())
            }
            Err(RequestFailure::Fatal(err)) => Err(err.into()),
        }
    }

    /// Issue one device-list request.
    async fn request(&self, token: &str) -> std::result::Result<Vec<DeviceRecord>, RequestFailure> {
        let response = self
            .http
            .get(self.api_url.clone())
            .query(&[("email", self.credentials.username())])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    RequestFailure::Fatal(TransportError::InvalidUrl(e.to_string()))
                } else {
                    RequestFailure::Network(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RequestFailure::Unauthorized);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RequestFailure::Fatal(TransportError::Network(e.to_string())))?;

        if !status.is_success() {
            let mut text = String::from_utf8_lossy(&body).into_owned();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(RequestFailure::Fatal(TransportError::Status {
                status: status.as_u16(),
                body: text,
            }));
        }

        let raw: Vec<Value> = serde_json::from_slice(&body)
            .map_err(|e| RequestFailure::Fatal(TransportError::Decode(e.to_string())))?;

        let total = raw.len();
        let devices: Vec<DeviceRecord> = raw
            .into_iter()
            .filter_map(DeviceRecord::from_value)
            .collect();
        if devices.len() < total {
            warn!(
                skipped = total - devices.len(),
                "Ignoring device records without a serial number"
            );
        }

        debug!(count = devices.len(), "Fetched devices");
        Ok(devices)
    }
}
