//! # ecosense-server
//!
//! Polls EcoSense radon monitors and serves the latest readings.
//!
//! Startup validates the account credentials and runs a first poll; if
//! either fails the server exits instead of serving nothing.
//!
//! ## Running
//!
//! ```bash
//! # Development
//! ECOSENSE_USERNAME=me@example.com ECOSENSE_PASSWORD=... cargo run --package ecosense-server
//!
//! # Production
//! ECOSENSE_CONFIG=/etc/ecosense/config.toml ./ecosense-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;

use anyhow::Context;
use ecosense_core::{Coordinator, DeviceClient, Settings};
use ecosense_server::api::create_router;
use ecosense_server::logging;
use ecosense_server::state::AppState;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    logging::init(&settings.server)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        username = %settings.username,
        unit = %settings.unit,
        interval_secs = settings.poll_interval_secs,
        "Starting ecosense-server"
    );

    let client = DeviceClient::from_settings(&settings)?;
    let coordinator = Arc::new(Coordinator::new(client, settings.poll_interval()));

    coordinator
        .validate()
        .await
        .context("Cannot connect to EcoSense with the configured credentials")?;
    coordinator
        .first_refresh()
        .await
        .context("Initial poll failed")?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let poller = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .run(async {
                    let _ = stop_rx.await;
                })
                .await;
        })
    };

    let app = create_router(AppState::new(coordinator, &settings).shared());
    let listener = TcpListener::bind(settings.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.bind))?;
    info!("Listening on {}", settings.server.bind);

    let signal = setup_signal_handlers();
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal.await;
        })
        .await?;

    let _ = stop_tx.send(());
    poller.await?;
    info!("Shutdown complete");

    Ok(())
}

/// Resolve once SIGINT or SIGTERM (Ctrl+C off Unix) arrives.
fn setup_signal_handlers() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler");
            let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.expect("Ctrl+C handler");
            info!("Received Ctrl+C, shutting down");
        }

        let _ = tx.send(());
    });

    rx
}
