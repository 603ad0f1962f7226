//! Tracing subscriber setup.
//!
//! - **Production**: JSON lines to a daily file, plain compact lines to
//!   stdout for journald
//! - **Development**: pretty stdout, with a line when each span closes
//!
//! Every poll runs inside a `poll` span carrying its sequence number, so
//! JSON lines emitted during a poll include `"span": {"name": "poll",
//! "seq": N}` next to their own flattened fields.
//!
//! The filter comes from `RUST_LOG`, then `ECOSENSE_LOG_LEVEL`, then
//! [`DEFAULT_DIRECTIVES`].

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use ecosense_core::ServerConfig;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable read when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "ECOSENSE_LOG_LEVEL";

/// Filter used when neither variable is set.
pub const DEFAULT_DIRECTIVES: &str = "info,hyper_util=warn,reqwest=warn";

/// Daily log files are named `ecosense.YYYY-MM-DD`.
const FILE_PREFIX: &str = "ecosense";

/// Keeps both non-blocking writers flushing until exit.
static GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Install the global subscriber for the configured mode.
///
/// # Errors
///
/// Returns an error if the filter directives are invalid or the log
/// directory cannot be created.
pub fn init(server: &ServerConfig) -> anyhow::Result<()> {
    let filter = filter_from(std::env::var(LOG_LEVEL_ENV).ok())?;

    if server.production {
        let dir = server.log_dir.clone().unwrap_or_else(default_log_directory);
        init_production(filter, &dir)
    } else {
        init_development(filter);
        Ok(())
    }
}

fn filter_from(fallback: Option<String>) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = fallback.as_deref().unwrap_or(DEFAULT_DIRECTIVES);
    EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid {LOG_LEVEL_ENV} directives '{directives}'"))
}

/// JSON formatting shared by the log file and tests.
fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
}

fn init_production(filter: EnvFilter, log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let (file, file_guard) =
        tracing_appender::non_blocking(RollingFileAppender::new(Rotation::DAILY, log_dir, FILE_PREFIX));
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    // journald adds its own timestamps and does not render ANSI
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(stdout)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer(file))
        .with(stdout_layer)
        .init();

    let _ = GUARDS.set((file_guard, stdout_guard));

    tracing::info!(log_dir = %log_dir.display(), "File logging enabled");
    Ok(())
}

fn init_development(filter: EnvFilter) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();
}

/// Platform default for `server.log_dir`.
fn default_log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/ecosense")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "ecosense")
            .map(|dirs| dirs.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("./logs"))
    }
}
