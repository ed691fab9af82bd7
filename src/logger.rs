use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::config::BridgeConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LogConfig {
    pub(crate) log_level: String,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) log_file: String,
}

impl LogConfig {
    pub fn new(log_level: impl Into<String>, log_dir: Option<PathBuf>, log_file: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            log_dir,
            log_file: log_file.into(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info", None, "zen-bridge.log")
    }
}

impl From<&BridgeConfig> for LogConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self::new(
            config.log_level.clone(),
            config.log_dir.clone(),
            config.log_file.clone(),
        )
    }
}

/// Keeps the file writer alive. Dropping it flushes pending log lines.
#[derive(Debug)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    installed: bool,
}

impl LogGuard {
    /// `false` when another subscriber was already in place.
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// Install the global subscriber: human readable lines on stderr and, with a
/// log directory, daily rolling JSON lines in `<log_dir>/<log_file>.<date>`.
///
/// Calling it again after a subscriber is set leaves the first one in place.
pub fn init_tracing(config: &LogConfig) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log level `{}`", config.log_level))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.log_file)
                .build(dir)
                .with_context(|| format!("could not open log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = Registry::default()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        debug!(level = %config.log_level, dir = ?config.log_dir, "logging initialised");
    }

    Ok(LogGuard {
        _file: file_guard,
        installed,
    })
}
