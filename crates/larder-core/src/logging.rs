//! Tracing subscriber bootstrap
//!
//! Larder ships no binary, so the host application installs the global
//! subscriber itself. This module packages the one obvious setup so every
//! embedder does not reinvent it: level from config, `RUST_LOG` override,
//! optional JSON output, optional log file.

use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global tracing subscriber from the logging configuration.
///
/// `RUST_LOG` in the environment takes precedence over `config.level`.
/// Fails if a subscriber is already installed or the log file cannot be
/// created.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let builder = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .with_ansi(false);
            if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true);
            if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
