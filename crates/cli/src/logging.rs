//! Logging setup
//!
//! Compact timestamped output on stderr, optionally mirrored to a file.
//! `RUST_LOG` takes precedence over the configured level:
//!
//! ```bash
//! RUST_LOG=splitter_watcher=trace splitter run
//! ```

use anyhow::{Context, Result};
use splitter_core::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Keeps the file writer flushing; hold until exit
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    /// Set when the configured filter could not be parsed
    pub filter_warning: Option<String>,
}

/// Initialize the global subscriber
pub fn init(config: &LoggingConfig) -> Result<LogGuard> {
    let mut filter_warning = None;
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(&config.default).unwrap_or_else(|e| {
            filter_warning = Some(format!(
                "Invalid logging.default '{}': {}; using info",
                config.default, e
            ));
            EnvFilter::new("info")
        })
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(CompactTime)
        .with_writer(std::io::stderr);

    let (file_layer, file_guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(CompactTime)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LogGuard {
        _file: file_guard,
        filter_warning,
    })
}
