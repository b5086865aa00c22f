//! File logging.
//!
//! Logs go to `~/.cache/ember/logs/<YYYY-MM-DD>-ember.log` so they never
//! interleave with streamed output. The level comes from `LOG_LEVEL`
//! (an `EnvFilter` directive, default `warn`).

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::constants::{APP_NAME, DEFAULT_LOG_LEVEL, ENV_LOG_LEVEL};

/// Install the global subscriber. Returns the log file path, or `None` when
/// logging could not be set up; ember runs either way.
pub fn init() -> Option<PathBuf> {
    match try_init() {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    }
}

fn try_init() -> Result<PathBuf> {
    let dir = Config::log_dir()?;
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let path = dir.join(log_file_name(chrono::Local::now().date_naive()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;
    Ok(path)
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(ENV_LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn log_file_name(date: chrono::NaiveDate) -> String {
    format!("{}-{APP_NAME}.log", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_dated() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(log_file_name(date), "2025-03-07-ember.log");
    }
}
