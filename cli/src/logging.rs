//! Diagnostics for the runonce binary itself.
//!
//! The wrapped command owns stdout, so the console layer writes to stderr.
//! The file layer is optional and keyed by pid so concurrent runs never
//! share a file.

use std::path::PathBuf;
use std::sync::OnceLock;

use runonce_core::api::LoggingConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// `directory` when set and non-blank, else `<tmp>/runonce`.
pub fn log_dir(logging: &LoggingConfig) -> PathBuf {
    logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("runonce"))
}

/// A non-blank `RUST_LOG` beats the configured level.
pub fn filter_for(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, String> {
    let directives = rust_log
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(level);
    EnvFilter::try_new(directives).map_err(|e| format!("invalid log filter `{directives}`: {e}"))
}

fn file_writer(dir: PathBuf) -> Result<(NonBlocking, WorkerGuard), String> {
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("create log dir {} failed: {e}", dir.display()))?;
    let appender =
        tracing_appender::rolling::never(dir, format!("runonce.{}.log", std::process::id()));
    Ok(tracing_appender::non_blocking(appender))
}

pub fn init(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled || !(logging.console || logging.file) {
        return Ok(());
    }

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = filter_for(&logging.level, rust_log.as_deref())?;

    let file_layer = if logging.file {
        let (writer, guard) = file_writer(log_dir(logging))?;
        // First init wins; a later guard is dropped and flushes nothing.
        let _ = FILE_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        None
    };

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| format!("install tracing subscriber failed: {e}"))
}
