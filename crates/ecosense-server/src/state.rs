//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use ecosense_core::{Coordinator, RadonUnit, Settings};
use tokio::sync::RwLock;

/// Handle to the state passed to every handler.
pub type SharedState = Arc<AppState>;

/// Shared application state.
pub struct AppState {
    coordinator: Arc<Coordinator>,
    unit: RwLock<RadonUnit>,
    username: String,
    poll_interval: Duration,
}

impl AppState {
    /// Create state around a running coordinator.
    ///
    /// The unit preference starts from `settings` and can later be changed
    /// in memory through the config API.
    pub fn new(coordinator: Arc<Coordinator>, settings: &Settings) -> Self {
        Self {
            coordinator,
            unit: RwLock::new(settings.unit),
            username: settings.username.clone(),
            poll_interval: settings.poll_interval(),
        }
    }

    /// Wrap in the handle type used by the router.
    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    /// The polling coordinator.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Current display unit.
    pub async fn unit(&self) -> RadonUnit {
        *self.unit.read().await
    }

    /// Replace the display unit.
    pub async fn set_unit(&self, unit: RadonUnit) {
        *self.unit.write().await = unit;
    }

    /// Account the coordinator polls for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Interval between background polls.
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
