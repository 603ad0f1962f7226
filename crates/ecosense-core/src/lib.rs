//! # ecosense-core
//!
//! Core logic for polling EcoSense radon monitors.
//!
//! This crate provides:
//! - Radon unit conversion and Green/Orange/Red alert classification
//! - An authenticated client for the EcoSense device API that recovers
//!   from expired tokens
//! - A polling coordinator that keeps the last good snapshot
//! - Per-device sensor accessors for a presentation layer
//!
//! ## Architecture
//!
//! - [`radon`] - Pure conversion and classification functions
//! - [`types`] - Device records and lenient numeric coercion
//! - [`auth`] - Credentials, session state, and the Cognito login
//! - [`srp`] - Cognito SRP password verification
//! - [`client`] - Device-list fetch with one-shot re-authentication
//! - [`coordinator`] - Serialized polling and snapshot caching
//! - [`sensor`] - Per-device, per-metric read accessors
//! - [`config`] - Settings loading and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod radon;
pub mod sensor;
pub mod srp;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use auth::{AuthError, CognitoProvider, Credentials, IdentityProvider, Session, Tokens};
pub use client::{DeviceClient, TransportError};
pub use config::{AuthFlow, ConfigError, ConfigResult, ProviderConfig, ServerConfig, Settings};
pub use coordinator::{Coordinator, PollStatus, Snapshot};
pub use error::{EcoSenseError, Result};
pub use radon::{classify_alert, convert_radon_level, AlertLevel, RadonUnit};
pub use sensor::{read_sensor, DeviceInfo, DeviceView, SensorKey, SensorState, SensorValue};
pub use types::DeviceRecord;
