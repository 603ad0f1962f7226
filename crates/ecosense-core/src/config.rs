//! Application configuration management.
//!
//! Settings are layered with the `config` crate: an optional TOML file
//! first, then `ECOSENSE_*` environment variables on top (nested keys use
//! `__`, e.g. `ECOSENSE_PROVIDER__API_URL`).
//!
//! Covers:
//! - Account credentials (username doubles as the device-list lookup key)
//! - Display unit preference
//! - Polling interval
//! - Identity provider and device API endpoints
//! - Server bind address and logging mode

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::radon::RadonUnit;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ECOSENSE_CONFIG";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ECOSENSE";

/// Default polling interval (5 minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Shortest polling interval accepted.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Errors from loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field failed validation.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("Configuration has {} problems: {}", .0.len(), join_errors(.0))]
    MultipleValidationErrors(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Account e-mail. Also sent as the `email` query parameter.
    pub username: String,

    /// Account password.
    #[serde(skip_serializing)]
    pub password: String,

    /// Unit readings are rendered in.
    #[serde(default)]
    pub unit: RadonUnit,

    /// Seconds between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Cloud endpoints.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("unit", &self.unit)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("provider", &self.provider)
            .field("server", &self.server)
            .finish()
    }
}

/// Identity provider and device API settings.
///
/// These are fixed for the EcoSense cloud; overriding them is only useful
/// against a staging or fake backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Cognito user pool id, `<region>_<id>`.
    pub user_pool_id: String,

    /// Cognito app client id.
    pub client_id: String,

    /// AWS region hosting the user pool.
    pub region: String,

    /// Device-list endpoint.
    pub api_url: Url,

    /// Identity provider endpoint. Derived from `region` when unset.
    pub identity_url: Option<Url>,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// How the password is proven to the identity provider.
    pub auth_flow: AuthFlow,
}

/// Cognito login flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFlow {
    /// `USER_SRP_AUTH`: the password never leaves the process.
    #[default]
    Srp,
    /// `USER_PASSWORD_AUTH`: only for app clients that allow it.
    Password,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            user_pool_id: "us-west-2_vB73oNa7f".to_string(),
            client_id: "1dk9ul54cdo42lt6e9u1oa9g1d".to_string(),
            region: "us-west-2".to_string(),
            api_url: Url::parse("https://api.cloud.ecosense.io/api/v1/device")
                .expect("Valid URL"),
            identity_url: None,
            request_timeout_secs: 30,
            auth_flow: AuthFlow::Srp,
        }
    }
}

impl ProviderConfig {
    /// The identity provider endpoint to post logins to.
    ///
    /// # Errors
    ///
    /// Returns an error if the region produces an invalid URL.
    pub fn identity_endpoint(&self) -> ConfigResult<Url> {
        if let Some(url) = &self.identity_url {
            return Ok(url.clone());
        }
        Url::parse(&format!("https://cognito-idp.{}.amazonaws.com/", self.region)).map_err(|e| {
            ConfigError::ValidationError {
                field: "provider.region".into(),
                message: e.to_string(),
            }
        })
    }

    /// User pool name as used in SRP hashes: the id after the region.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        self.user_pool_id
            .split_once('_')
            .map_or(self.user_pool_id.as_str(), |(_, name)| name)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: SocketAddr,

    /// Use production logging (JSON file + plain stdout).
    pub production: bool,

    /// Directory for production log files. Platform default when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            production: false,
            log_dir: None,
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Settings {
    /// Load settings from the default locations.
    ///
    /// Uses the file named by `ECOSENSE_CONFIG` (must exist) or else the
    /// platform default path (optional), then applies environment
    /// overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or validation finds problems.
    pub fn load() -> ConfigResult<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load_from(Some(Path::new(&path)), true, None),
            None => Self::load_from(default_config_path().as_deref(), false, None),
        }
    }

    /// Load settings from an explicit file plus environment.
    ///
    /// `env` replaces the process environment when given, which keeps
    /// tests independent of each other.
    ///
    /// # Errors
    ///
    /// Returns an error if a required file is missing, a source cannot be
    /// parsed, or validation fails.
    pub fn load_from(
        path: Option<&Path>,
        required: bool,
        env: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(required));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(?settings, "Loaded settings");
        Ok(settings)
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a single problem and
    /// [`ConfigError::MultipleValidationErrors`] for several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut fail = |field: &str, message: &str| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        if self.username.trim().is_empty() {
            fail("username", "must not be empty");
        }
        if self.password.is_empty() {
            fail("password", "must not be empty");
        }
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            fail(
                "poll_interval_secs",
                &format!("must be at least {MIN_POLL_INTERVAL_SECS} seconds"),
            );
        }
        if self.provider.client_id.trim().is_empty() {
            fail("provider.client_id", "must not be empty");
        }
        if !self
            .provider
            .user_pool_id
            .starts_with(&format!("{}_", self.provider.region))
        {
            fail(
                "provider.user_pool_id",
                "must be prefixed with the configured region",
            );
        }
        if self.provider.request_timeout_secs == 0 {
            fail("provider.request_timeout_secs", "must be greater than zero");
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Polling interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Platform default config file location.
///
/// `/etc/ecosense/config.toml` on Linux, the per-user config directory
/// elsewhere.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Some(PathBuf::from("/etc/ecosense/config.toml"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "ecosense")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_load_from_env_only_uses_defaults() {
        let settings = Settings::load_from(
            None,
            false,
            env(&[
                ("ECOSENSE_USERNAME", "me@example.com"),
                ("ECOSENSE_PASSWORD", "hunter2"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.username, "me@example.com");
        assert_eq!(settings.unit, RadonUnit::PicocuriesPerLiter);
        assert_eq!(settings.poll_interval(), Duration::from_secs(300));
        assert_eq!(settings.provider.region, "us-west-2");
        assert_eq!(
            settings.provider.identity_endpoint().unwrap().as_str(),
            "https://cognito-idp.us-west-2.amazonaws.com/"
        );
        assert!(!settings.server.production);
        assert_eq!(settings.server.log_dir, None);
        assert_eq!(settings.provider.auth_flow, AuthFlow::Srp);
        assert_eq!(settings.provider.pool_name(), "vB73oNa7f");
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
username = "file@example.com"
password = "from-file"
unit = "bqm3"
poll_interval_secs = 120

[provider]
api_url = "http://127.0.0.1:9000/api/v1/device"
auth_flow = "password"
"#
        )
        .unwrap();

        let settings = Settings::load_from(
            Some(file.path()),
            true,
            env(&[("ECOSENSE_POLL_INTERVAL_SECS", "60")]),
        )
        .unwrap();

        assert_eq!(settings.username, "file@example.com");
        assert_eq!(settings.unit, RadonUnit::BecquerelsPerCubicMeter);
        assert_eq!(settings.poll_interval_secs, 60);
        assert_eq!(
            settings.provider.api_url.as_str(),
            "http://127.0.0.1:9000/api/v1/device"
        );
        assert_eq!(settings.provider.client_id, "1dk9ul54cdo42lt6e9u1oa9g1d");
        assert_eq!(settings.provider.auth_flow, AuthFlow::Password);
    }

    #[test]
    fn test_missing_required_file() {
        let result = Settings::load_from(
            Some(Path::new("/nonexistent/ecosense.toml")),
            true,
            env(&[]),
        );
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let result = Settings::load_from(
            None,
            false,
            env(&[
                ("ECOSENSE_USERNAME", " "),
                ("ECOSENSE_PASSWORD", "x"),
                ("ECOSENSE_POLL_INTERVAL_SECS", "5"),
            ]),
        );

        match result {
            Err(ConfigError::MultipleValidationErrors(errors)) => {
                assert_eq!(errors.len(), 2);
                let text = ConfigError::MultipleValidationErrors(errors).to_string();
                assert!(text.contains("username"));
                assert!(text.contains("poll_interval_secs"));
            }
            other => panic!("expected multiple validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_single_validation_error() {
        let result = Settings::load_from(
            None,
            false,
            env(&[
                ("ECOSENSE_USERNAME", "me@example.com"),
                ("ECOSENSE_PASSWORD", "x"),
                ("ECOSENSE_PROVIDER__REGION", "eu-west-1"),
            ]),
        );
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError { ref field, .. }) if field == "provider.user_pool_id"
        ));
    }

    #[test]
    fn test_env_credentials_are_kept_verbatim() {
        let settings = Settings::load_from(
            None,
            false,
            env(&[
                ("ECOSENSE_USERNAME", "1.50"),
                ("ECOSENSE_PASSWORD", "0123"),
                ("ECOSENSE_POLL_INTERVAL_SECS", "90"),
                ("ECOSENSE_SERVER__PRODUCTION", "true"),
                ("ECOSENSE_SERVER__LOG_DIR", "/srv/logs"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.username, "1.50");
        assert_eq!(settings.password, "0123");
        assert_eq!(settings.poll_interval_secs, 90);
        assert!(settings.server.production);
        assert_eq!(settings.server.log_dir, Some(PathBuf::from("/srv/logs")));

        let settings = Settings::load_from(
            None,
            false,
            env(&[("ECOSENSE_USERNAME", "me@example.com"), ("ECOSENSE_PASSWORD", "TRUE")]),
        )
        .unwrap();
        assert_eq!(settings.password, "TRUE");
    }

    #[test]
    fn test_password_is_redacted() {
        let settings = Settings::load_from(
            None,
            false,
            env(&[
                ("ECOSENSE_USERNAME", "me@example.com"),
                ("ECOSENSE_PASSWORD", "hunter2"),
            ]),
        )
        .unwrap();

        assert!(!format!("{settings:?}").contains("hunter2"));
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with("config.toml"));
    }
}
