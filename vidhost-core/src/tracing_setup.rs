//! Log output for the vidhost binary.
//!
//! The console shows what the operator asked for. Optionally, a per-run log
//! file keeps every event from the vidhost crates, including per-chunk stream
//! traces, while dependencies stay at `info` so hyper does not drown it.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt as layer_fmt};

/// File name of the per-run log inside the logs directory.
pub const LAST_RUN_LOG: &str = "vidhost-last-run.log";

/// Filter for the run log: everything from vidhost, requests from tower-http.
const RUN_LOG_DIRECTIVES: &str =
    "info,vidhost=trace,vidhost_core=trace,vidhost_web=trace,tower_http=debug";

/// Failures installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("cannot create run log {}: {source}", path.display())]
    RunLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("tracing already initialized: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Installs the console layer and, when `logs_dir` is given, the run log.
///
/// `RUST_LOG` overrides `console_level` on the console. The run log is
/// truncated on every start. Returns the run log path, if any.
///
/// # Errors
///
/// - `TracingError::RunLog` - Logs directory or log file cannot be created
/// - `TracingError::AlreadyInstalled` - A global subscriber is already set
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<Option<PathBuf>, TracingError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.as_str()));
    let console_layer = layer_fmt::layer()
        .compact()
        .with_target(false)
        .with_filter(console_filter);

    let run_log = logs_dir.map(open_run_log).transpose()?;
    let run_log_path = run_log.as_ref().map(|(path, _)| path.clone());
    let file_layer = run_log.map(|(_, file)| {
        layer_fmt::layer()
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(file)
            .with_filter(EnvFilter::new(RUN_LOG_DIRECTIVES))
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    match &run_log_path {
        Some(path) => tracing::info!(console = %console_level, run_log = %path.display(), "Logging ready"),
        None => tracing::info!(console = %console_level, "Logging ready, no run log"),
    }

    Ok(run_log_path)
}

fn open_run_log(dir: &Path) -> Result<(PathBuf, File), TracingError> {
    let path = dir.join(LAST_RUN_LOG);
    std::fs::create_dir_all(dir)
        .and_then(|()| File::create(&path))
        .map(|file| (path.clone(), file))
        .map_err(|source| TracingError::RunLog { path, source })
}

/// Console verbosity accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    /// Includes one event per streamed chunk
    Trace,
}

impl CliLogLevel {
    /// Tracing level for this choice.
    ///
    /// ```
    /// use vidhost_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Info.as_tracing_level(), tracing::Level::INFO);
    /// ```
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

impl fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_tracing_level().as_str().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(CliLogLevel::Warn.as_tracing_level(), Level::WARN);
        assert_eq!(CliLogLevel::Trace.as_tracing_level(), Level::TRACE);
        assert_eq!(CliLogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_run_log_directives_parse() {
        assert!(EnvFilter::try_new(RUN_LOG_DIRECTIVES).is_ok());
    }

    #[test]
    fn test_run_log_is_created_and_truncated() {
        let temp = tempfile::tempdir().unwrap();
        let logs_dir = temp.path().join("logs");

        let (path, _) = open_run_log(&logs_dir).unwrap();
        assert_eq!(path, logs_dir.join(LAST_RUN_LOG));
        std::fs::write(&path, "previous run").unwrap();

        open_run_log(&logs_dir).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_run_log_in_unwritable_location() {
        let temp = tempfile::NamedTempFile::new().unwrap();

        let err = open_run_log(&temp.path().join("logs")).unwrap_err();
        assert!(matches!(err, TracingError::RunLog { .. }));
    }
}
