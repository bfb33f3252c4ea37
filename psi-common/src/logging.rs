//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events; whoever hosts the engine calls
//! [`init`] once to install a formatter.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Returns `Ok(false)`
/// when a global subscriber was already installed.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Config(format!("Invalid log level {:?}: {}", config.level, e)))?;

    let installed = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };

    Ok(installed)
}
