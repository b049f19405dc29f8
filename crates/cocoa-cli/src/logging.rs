//! Tracing setup for the `cocoa` binary.
//!
//! Logs go to stderr so stdout stays clean for results. `RUST_LOG` overrides
//! the default filter.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use cocoa_infrastructure::CocoaPaths;

const DEFAULT_FILTER: &str = "warn,cocoa=info";
const LOG_FILE_PREFIX: &str = "cocoa.log";

/// Installs the global subscriber.
///
/// With `log_file`, a daily rolling file under [`CocoaPaths::logs_dir`] is added.
/// The returned guard must live until exit or buffered lines are lost.
pub fn init(log_file: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, guard) = if log_file {
        let dir = CocoaPaths::logs_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
