//! Polling coordinator.
//!
//! Drives a [`DeviceClient`] on a fixed interval and keeps the latest
//! successful result. Polls are serialized through a mutex around the
//! client, so a re-authentication can never race a read. A failed poll
//! leaves the previous snapshot in place.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::auth::{CognitoProvider, IdentityProvider};
use crate::client::DeviceClient;
use crate::error::Result;
use crate::types::DeviceRecord;

/// The device list from one successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Devices in API order.
    pub devices: Vec<DeviceRecord>,
    /// When the poll completed.
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Look a device up by serial number.
    #[must_use]
    pub fn device(&self, serial_number: &str) -> Option<&DeviceRecord> {
        self.devices
            .iter()
            .find(|d| d.serial_number == serial_number)
    }
}

/// Outcome bookkeeping for the poll loop.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PollStatus {
    /// Completion time of the last successful poll.
    pub last_success_utc: Option<DateTime<Utc>>,
    /// Time of the last failed poll.
    pub last_failure_utc: Option<DateTime<Utc>>,
    /// Message of the last failure, cleared on success.
    pub last_error: Option<String>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Devices in the current snapshot.
    pub device_count: usize,
}

/// Serializes polls of one client and caches the latest snapshot.
pub struct Coordinator<P = CognitoProvider> {
    client: Mutex<DeviceClient<P>>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<PollStatus>,
    interval: Duration,
    polls: AtomicU64,
}

impl<P: IdentityProvider> Coordinator<P> {
    /// Wrap a client polled every `interval`.
    pub fn new(client: DeviceClient<P>, interval: Duration) -> Self {
        Self {
            client: Mutex::new(client),
            snapshot: RwLock::new(None),
            status: RwLock::new(PollStatus::default()),
            interval,
            polls: AtomicU64::new(0),
        }
    }

    /// Polling interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Latest snapshot, if any poll has succeeded.
    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Current poll bookkeeping.
    pub async fn status(&self) -> PollStatus {
        self.status.read().await.clone()
    }

    /// Validate the client's credentials.
    ///
    /// # Errors
    ///
    /// Returns the login failure.
    pub async fn validate(&self) -> Result<()> {
        self.client.lock().await.validate().await?;
        Ok(())
    }

    /// Poll once.
    ///
    /// Waits for any poll already in flight. On success the snapshot is
    /// replaced wholesale; on failure it is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after recording it in [`PollStatus`].
    #[instrument(name = "poll", skip_all, fields(seq = self.polls.fetch_add(1, Ordering::Relaxed) + 1))]
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let mut client = self.client.lock().await;
        let started = Instant::now();

        match client.fetch_devices().await {
            Ok(devices) => {
                let snapshot = Arc::new(Snapshot {
                    devices,
                    fetched_at: Utc::now(),
                });
                *self.snapshot.write().await = Some(snapshot.clone());

                let mut status = self.status.write().await;
                status.last_success_utc = Some(snapshot.fetched_at);
                status.last_error = None;
                status.consecutive_failures = 0;
                status.device_count = snapshot.devices.len();

                info!(
                    devices = snapshot.devices.len(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Poll succeeded"
                );
                Ok(snapshot)
            }
            Err(err) => {
                let mut status = self.status.write().await;
                status.last_failure_utc = Some(Utc::now());
                status.last_error = Some(err.to_string());
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);

                warn!(
                    error = %err,
                    code = err.error_code(),
                    consecutive_failures = status.consecutive_failures,
                    "Poll failed, keeping previous data"
                );
                Err(err)
            }
        }
    }

    /// The refresh run during setup.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; setup should not continue without data.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>> {
        self.refresh().await.map_err(|err| {
            error!(error = %err, "Initial poll failed");
            err
        })
    }

    /// Poll on the interval until `shutdown` resolves.
    ///
    /// The first poll happens one interval from now; call
    /// [`Coordinator::first_refresh`] beforehand for immediate data.
    /// A slow poll delays the next tick rather than stacking polls.
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tokio::pin!(shutdown);
        info!(interval_secs = self.interval.as_secs(), "Poll loop started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Poll loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    // Failures are recorded in the status and logged.
                    let _ = self.refresh().await;
                }
            }
        }
    }
}
