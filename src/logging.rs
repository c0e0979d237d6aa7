//! Process-wide `tracing` setup for the binary and the demos.
//!
//! Library code only emits events; installing a subscriber is left to
//! whoever owns the process.

use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Overrides the level-derived filter when set.
pub const FILTER_ENV: &str = "TELEOP_LOG_FILTER";

/// Targets kept at `info` unless the filter is overridden.
const NOISY_TARGETS: &[&str] = &["tokio_tungstenite", "tungstenite", "mio"];

/// Verbosity.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    #[default]
    Warn,
    /// Session milestones and samples.
    Info,
    /// State machine decisions.
    Debug,
    /// Every event.
    Trace,
}

impl LogLevel {
    /// Filter directive name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Matching `tracing` level filter.
    pub const fn to_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Where and how much to log.
#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    /// Verbosity.
    pub level: LogLevel,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Logging setup failure.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    /// The log file could not be opened.
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        /// Requested path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A global subscriber was already installed.
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Calling it again is a no-op.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or another subscriber
/// is already installed.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if GUARD.get().is_some() {
        return Ok(());
    }

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level))
        .with_level(true)
        .with_target(config.level >= LogLevel::Debug)
        .with_thread_names(config.level >= LogLevel::Debug)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;

    let _ = GUARD.set(guard);
    Ok(())
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    match std::env::var(FILTER_ENV) {
        Ok(filter) => EnvFilter::new(filter),
        Err(_) => EnvFilter::new(default_filter(level)),
    }
}

/// Filter directives for a level, with dependency chatter capped at `info`.
fn default_filter(level: LogLevel) -> String {
    let mut filter = level.as_str().to_owned();
    if level > LogLevel::Info {
        for target in NOISY_TARGETS {
            filter.push(',');
            filter.push_str(target);
            filter.push_str("=info");
        }
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_dependencies() {
        assert_eq!(default_filter(LogLevel::Warn), "warn");
        assert_eq!(default_filter(LogLevel::Info), "info");
        assert_eq!(
            default_filter(LogLevel::Trace),
            "trace,tokio_tungstenite=info,tungstenite=info,mio=info"
        );
    }

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Trace > LogLevel::Debug);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert_eq!(LogLevel::default(), LogLevel::Warn);
        assert_eq!(LogLevel::Debug.to_filter(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_unwritable_log_file() {
        let config = LogConfig {
            level: LogLevel::Info,
            file: Some(PathBuf::from("/nonexistent-dir/teleop.log")),
        };
        assert!(matches!(init(&config), Err(InitError::Io { .. })));
    }
}
