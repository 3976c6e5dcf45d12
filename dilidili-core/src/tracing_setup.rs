//! Tracing setup for the `dilidili` binary.
//!
//! Console logs share stderr with the progress line, so HTTP client internals
//! are held at `warn` or quieter unless `DILIDILI_LOG` says otherwise. When a
//! logs directory is given, a second layer records the whole run at TRACE.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Environment variable holding an explicit console filter.
pub const LOG_FILTER_ENV: &str = "DILIDILI_LOG";

/// File name of the per-run trace inside the logs directory.
pub const LAST_RUN_LOG_FILE: &str = "dilidili-last-run.log";

/// Dependencies whose debug output drowns the pipeline's own.
const NOISY_TARGETS: [&str; 3] = ["hyper_util", "reqwest", "h2"];

#[derive(Debug, Error)]
pub enum TracingSetupError {
    #[error("Failed to create logs directory {}: {source}", .path.display())]
    LogsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Global tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Console filter for `level` with noisy dependencies capped at `warn`.
pub fn console_directives(level: Level) -> String {
    let capped = level.min(Level::WARN).as_str().to_lowercase();
    let mut directives = level.as_str().to_lowercase();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{target}={capped}"));
    }
    directives
}

/// Creates `logs_dir` and truncates the last-run log inside it.
fn open_last_run_log(logs_dir: &Path) -> Result<(File, PathBuf), TracingSetupError> {
    create_dir_all(logs_dir).map_err(|e| TracingSetupError::LogsDir {
        path: logs_dir.to_path_buf(),
        source: e,
    })?;

    let path = logs_dir.join(LAST_RUN_LOG_FILE);
    let file = File::create(&path).map_err(|e| TracingSetupError::LogFile {
        path: path.clone(),
        source: e,
    })?;
    Ok((file, path))
}

/// Installs the global subscriber.
///
/// Returns the trace file path when `logs_dir` is given.
///
/// # Errors
/// - `TracingSetupError::LogsDir` / `LogFile` - Trace file not creatable
/// - `TracingSetupError::AlreadyInstalled` - Called twice in one process
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<Option<PathBuf>, TracingSetupError> {
    let console_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(console_directives(console_level)));
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, log_path) = match logs_dir {
        Some(dir) => {
            let (file, path) = open_last_run_log(dir)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(file)
                .with_filter(EnvFilter::new("trace"));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(path) = &log_path {
        tracing::debug!("Writing full trace to {}", path.display());
    }
    Ok(log_path)
}

/// Console verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliLogLevel {
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_console_directives_cap_http_internals() {
        assert_eq!(
            console_directives(Level::DEBUG),
            "debug,hyper_util=warn,reqwest=warn,h2=warn"
        );
        assert_eq!(
            console_directives(Level::ERROR),
            "error,hyper_util=error,reqwest=error,h2=error"
        );
        assert!(EnvFilter::try_new(console_directives(Level::TRACE)).is_ok());
    }

    #[test]
    fn test_cli_level_mapping() {
        assert_eq!(CliLogLevel::Error.as_tracing_level(), Level::ERROR);
        assert_eq!(CliLogLevel::Info.as_tracing_level(), Level::INFO);
        assert_eq!(CliLogLevel::Trace.as_tracing_level(), Level::TRACE);
    }

    #[test]
    fn test_last_run_log_is_truncated() {
        let temp_dir = tempdir().unwrap();
        let logs_dir = temp_dir.path().join("logs");

        let (_, path) = open_last_run_log(&logs_dir).unwrap();
        assert_eq!(path, logs_dir.join(LAST_RUN_LOG_FILE));
        std::fs::write(&path, b"previous run").unwrap();

        open_last_run_log(&logs_dir).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_unusable_logs_dir_is_reported() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("logs");
        std::fs::write(&blocker, b"file, not dir").unwrap();

        let result = open_last_run_log(&blocker.join("nested"));
        assert!(matches!(result, Err(TracingSetupError::LogsDir { .. })));
    }
}
