//! Tracing setup and the debug sink handed to documents.
//!
//! The terminal belongs to the pager while a session runs, so log output
//! goes to a file instead of stderr.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::ConfigError;

/// Default filter when neither `RUST_LOG`, `--debug` nor `DLOG_LOG_LEVEL`
/// say otherwise.
pub const DEFAULT_LOG_LEVEL: &str = "dlog=info";

/// Install the global subscriber, writing to `config.log_file`.
///
/// Priority: `RUST_LOG` > `--debug` > `DLOG_LOG_LEVEL` > [`DEFAULT_LOG_LEVEL`].
pub fn init(config: &Config) -> Result<(), ConfigError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .map_err(|source| ConfigError::LogFile {
            path: config.log_file.clone(),
            source,
        })?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.debug {
            EnvFilter::new("dlog=debug")
        } else {
            EnvFilter::new(config.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_level(true),
        )
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Logging initialised");
    Ok(())
}

/// One-way debug channel shared by the session, its documents and the
/// diagnostics reporter.
///
/// The default sink forwards to `tracing` at debug level. A memory sink
/// keeps lines in a buffer instead, which is what tests read.
#[derive(Clone, Default)]
pub struct LogSink {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogSink {
    /// Sink that forwards to `tracing::debug!`.
    pub fn tracing() -> Self {
        Self { buffer: None }
    }

    /// Sink that records every line, plus the buffer it records into.
    pub fn memory() -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                buffer: Some(Arc::clone(&buffer)),
            },
            buffer,
        )
    }

    /// Emit one debug line.
    pub fn debug(&self, message: impl fmt::Display) {
        match &self.buffer {
            Some(buffer) => {
                if let Ok(mut lines) = buffer.lock() {
                    lines.push(message.to_string());
                }
            }
            None => tracing::debug!("{}", message),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.buffer {
            Some(_) => f.write_str("LogSink::Memory"),
            None => f.write_str("LogSink::Tracing"),
        }
    }
}
