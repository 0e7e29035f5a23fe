//! Tracing subscriber setup.
//!
//! Logs go to a daily-rolling file under `$GATECTL_HOME/logs`. Debug mode adds
//! a stderr layer. `GATECTL_LOG` takes an `EnvFilter` directive and wins over
//! both defaults.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::paths;

pub const LOG_ENV_VAR: &str = "GATECTL_LOG";
const LOG_FILE_PREFIX: &str = "gatectl.log";

/// Builds the filter: `GATECTL_LOG` if set, else `debug` or `info`.
fn env_filter(debug: bool) -> EnvFilter {
    let default = if debug { "debug" } else { "info" };
    match std::env::var(LOG_ENV_VAR) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives.trim())
            .unwrap_or_else(|e| {
                eprintln!("Ignoring invalid {LOG_ENV_VAR}: {e}");
                EnvFilter::new(default)
            }),
        _ => EnvFilter::new(default),
    }
}

/// Installs the global subscriber writing to the default logs directory.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
///
/// # Errors
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init(debug: bool) -> Result<WorkerGuard> {
    init_in(&paths::logs_dir(), debug)
}

/// Same as [`init`] with an explicit logs directory.
///
/// # Errors
/// Returns an error if the directory cannot be created or a global
/// subscriber is already installed.
pub fn init_in(dir: &Path, debug: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    let stderr_layer = debug.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
    });

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(dir = %dir.display(), "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_default_filter_follows_debug_flag() {
        // GATECTL_LOG is not set in the test environment.
        if std::env::var(LOG_ENV_VAR).is_ok() {
            return;
        }
        assert_eq!(env_filter(true).to_string(), "debug");
        assert_eq!(env_filter(false).to_string(), "info");
    }

    #[test]
    fn test_init_in_creates_directory_and_refuses_twice() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");

        let guard = init_in(&logs, false).unwrap();
        assert!(logs.is_dir());
        assert!(init_in(&logs, false).is_err());
        drop(guard);
    }
}
