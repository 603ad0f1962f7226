//! Authentication against the EcoSense identity provider.
//!
//! EcoSense accounts live in an AWS Cognito user pool. A login yields an
//! ID token that the device API accepts as a bearer token. The default
//! flow proves the password with SRP (see [`crate::srp`]); plain
//! `USER_PASSWORD_AUTH` is available for app clients that enable it.
//!
//! - [`Credentials`] - immutable username/password pair
//! - [`Tokens`] - what a successful login returns
//! - [`Session`] - explicit `Unauthenticated | Authenticated` state
//! - [`IdentityProvider`] - the login seam, implemented by [`CognitoProvider`]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{AuthFlow, ConfigError, ProviderConfig};
use crate::srp::{self, Challenge, SrpSession};

/// Cognito JSON protocol action header value for `InitiateAuth`.
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

/// Cognito JSON protocol action header value for `RespondToAuthChallenge`.
const RESPOND_TO_AUTH_CHALLENGE_TARGET: &str =
    "AWSCognitoIdentityProviderService.RespondToAuthChallenge";

/// Challenge answered by the SRP flow.
const PASSWORD_VERIFIER: &str = "PASSWORD_VERIFIER";

/// Cognito JSON protocol content type.
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Token lifetime assumed when the provider omits `ExpiresIn`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Cognito never issues ID tokens valid for longer than a day.
const MAX_EXPIRES_IN_SECS: i64 = 86_400;

/// Tokens are treated as expired this long before their stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Errors raised while authenticating.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The identity provider refused the credentials.
    #[error("Credentials rejected: {0}")]
    Rejected(String),

    /// The identity provider could not be reached.
    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),

    /// The identity provider answered with an unexpected error.
    #[error("Identity provider error ({status} {kind}): {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Provider error type, e.g. `TooManyRequestsException`.
        kind: String,
        /// Provider message.
        message: String,
    },

    /// A success response carried no usable token.
    #[error("Malformed identity provider response: {0}")]
    MalformedResponse(String),

    /// The device API rejected a freshly issued token.
    #[error("Device API rejected the token after re-authentication")]
    TokenRejected,
}

/// Account credentials. Immutable once built.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Account username (e-mail).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tokens minted by a successful login.
#[derive(Clone)]
pub struct Tokens {
    /// Bearer token for the device API.
    pub id_token: String,
    /// Cognito access token.
    pub access_token: Option<String>,
    /// Refresh token, when the provider issued one.
    pub refresh_token: Option<String>,
    /// When the ID token stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Build tokens expiring `expires_in` seconds from `now`.
    #[must_use]
    pub fn new(id_token: impl Into<String>, expires_in: i64, now: DateTime<Utc>) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: None,
            refresh_token: None,
            expires_at: now + ChronoDuration::seconds(expires_in),
        }
    }

    /// Whether the ID token should be considered expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("id_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Why a session cannot hand out a bearer token right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleToken {
    /// No login has happened yet.
    NoToken,
    /// The last login's token is past its expiry.
    Expired,
}

/// Authentication state of a client.
///
/// [`Session::Authenticated`] only means a token was issued; the server
/// may still reject it. The only transition is a fresh login, which
/// replaces the tokens wholesale.
#[derive(Debug, Clone, Default)]
pub enum Session {
    /// No token yet.
    #[default]
    Unauthenticated,
    /// Holds the tokens of the most recent login.
    Authenticated(Tokens),
}

impl Session {
    /// Whether a login has happened.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The bearer token to send, unless it is missing or known expired.
    ///
    /// # Errors
    ///
    /// Returns the [`StaleToken`] reason when no usable token exists.
    pub fn bearer(&self, now: DateTime<Utc>) -> Result<&str, StaleToken> {
        match self {
            Self::Unauthenticated => Err(StaleToken::NoToken),
            Self::Authenticated(tokens) if tokens.is_expired(now) => Err(StaleToken::Expired),
            Self::Authenticated(tokens) => Ok(&tokens.id_token),
        }
    }
}

/// Something that can exchange credentials for tokens.
pub trait IdentityProvider: Send + Sync {
    /// Perform a password login.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Tokens, AuthError>> + Send;
}

/// Cognito user-pool login over the unsigned JSON API.
///
/// Uses SRP unless configured for `USER_PASSWORD_AUTH`.
#[derive(Debug, Clone)]
pub struct CognitoProvider {
    http: reqwest::Client,
    endpoint: Url,
    client_id: String,
    pool_name: String,
    flow: AuthFlow,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: BTreeMap<&'static str, &'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeRequest<'a> {
    challenge_name: &'static str,
    client_id: &'a str,
    challenge_responses: BTreeMap<&'static str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a str>,
}

/// Body of both `InitiateAuth` and `RespondToAuthChallenge` replies.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
    #[serde(default)]
    challenge_parameters: HashMap<String, String>,
    session: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct CognitoErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Error types that mean "these credentials are wrong".
const REJECTION_KINDS: &[&str] = &[
    "NotAuthorizedException",
    "UserNotFoundException",
    "UserNotConfirmedException",
    "PasswordResetRequiredException",
];

impl CognitoProvider {
    /// Create an SRP provider posting to `endpoint` with the given app
    /// client. `pool_name` is the user pool id without its region prefix.
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        client_id: impl Into<String>,
        pool_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint,
            client_id: client_id.into(),
            pool_name: pool_name.into(),
            flow: AuthFlow::Srp,
        }
    }

    /// Use a different login flow.
    #[must_use]
    pub const fn with_flow(mut self, flow: AuthFlow) -> Self {
        self.flow = flow;
        self
    }

    /// Create a provider from the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity endpoint cannot be derived.
    pub fn from_config(http: reqwest::Client, config: &ProviderConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            http,
            config.identity_endpoint()?,
            config.client_id.clone(),
            config.pool_name(),
        )
        .with_flow(config.auth_flow))
    }

    async fn login_password(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let body = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.client_id,
            auth_parameters: BTreeMap::from([
                ("USERNAME", credentials.username()),
                ("PASSWORD", credentials.password()),
            ]),
        };
        self.call(INITIATE_AUTH_TARGET, &body).await
    }

    async fn login_srp(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let srp = SrpSession::new();
        let public = srp.public_hex();
        let body = InitiateAuthRequest {
            auth_flow: "USER_SRP_AUTH",
            client_id: &self.client_id,
            auth_parameters: BTreeMap::from([
                ("USERNAME", credentials.username()),
                ("SRP_A", public.as_str()),
            ]),
        };
        let initiated: AuthResponse = self.call(INITIATE_AUTH_TARGET, &body).await?;
        if initiated.challenge_name.as_deref() != Some(PASSWORD_VERIFIER) {
            return Ok(initiated);
        }

        let params = &initiated.challenge_parameters;
        let challenge = Challenge {
            user_id: challenge_param(params, "USER_ID_FOR_SRP")?,
            salt_hex: challenge_param(params, "SALT")?,
            server_public_hex: challenge_param(params, "SRP_B")?,
            secret_block: challenge_param(params, "SECRET_BLOCK")?,
        };
        let timestamp = srp::timestamp(Utc::now());
        let signature = srp
            .password_signature(&self.pool_name, credentials.password(), &challenge, &timestamp)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let body = RespondToAuthChallengeRequest {
            challenge_name: PASSWORD_VERIFIER,
            client_id: &self.client_id,
            challenge_responses: BTreeMap::from([
                ("TIMESTAMP", timestamp.as_str()),
                ("USERNAME", challenge.user_id),
                ("PASSWORD_CLAIM_SECRET_BLOCK", challenge.secret_block),
                ("PASSWORD_CLAIM_SIGNATURE", signature.as_str()),
            ]),
            session: initiated.session.as_deref(),
        };
        debug!("Answering password verifier challenge");
        self.call(RESPOND_TO_AUTH_CHALLENGE_TARGET, &body).await
    }

    /// Post one Cognito action and decode its reply.
    async fn call<B: Serialize + Sync>(
        &self,
        target: &'static str,
        body: &B,
    ) -> Result<AuthResponse, AuthError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", target)
            .body(payload)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }
}

impl IdentityProvider for CognitoProvider {
    #[instrument(skip_all, fields(username = %credentials.username(), flow = ?self.flow))]
    async fn login(&self, credentials: &Credentials) -> Result<Tokens, AuthError> {
        let response = match self.flow {
            AuthFlow::Srp => self.login_srp(credentials).await?,
            AuthFlow::Password => self.login_password(credentials).await?,
        };

        if let Some(challenge) = response.challenge_name {
            warn!(%challenge, "Identity provider requested an unsupported challenge");
            return Err(AuthError::MalformedResponse(format!(
                "unsupported challenge '{challenge}'"
            )));
        }

        let result = response
            .authentication_result
            .ok_or_else(|| AuthError::MalformedResponse("missing AuthenticationResult".into()))?;
        let id_token = result
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("missing IdToken".into()))?;

        let expires_in = result
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .clamp(0, MAX_EXPIRES_IN_SECS);
        let mut tokens = Tokens::new(id_token, expires_in, Utc::now());
        tokens.access_token = result.access_token;
        tokens.refresh_token = result.refresh_token;

        debug!(expires_at = %tokens.expires_at, "Login succeeded");
        Ok(tokens)
    }
}

fn challenge_param<'a>(
    params: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, AuthError> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| AuthError::MalformedResponse(format!("challenge is missing {key}")))
}

/// Map a non-2xx identity provider response to an [`AuthError`].
fn classify_failure(status: u16, body: &str) -> AuthError {
    let parsed = serde_json::from_str::<CognitoErrorBody>(body).ok();
    let (kind, message) = parsed.map_or_else(
        || (String::new(), body.trim().to_string()),
        |b| {
            // Some endpoints prefix the type with a namespace: "ns#Type".
            let kind = b.kind.rsplit('#').next().unwrap_or_default().to_string();
            (kind, b.message)
        },
    );

    if REJECTION_KINDS.contains(&kind.as_str()) {
        AuthError::Rejected(message)
    } else {
        AuthError::Provider {
            status,
            kind,
            message,
        }
    }
}
