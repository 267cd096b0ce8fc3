//! Error types shared across dlog subsystems.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value was present but could not be interpreted.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting name (env var or flag).
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// An environment variable held non-UTF-8 data.
    #[error("Environment variable {key} is not valid unicode")]
    NotUnicode {
        /// Variable name.
        key: String,
    },

    /// The log file could not be opened.
    #[error("Failed to open log file '{}': {source}", path.display())]
    LogFile {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the cache file manager.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The temp file could not be created.
    #[error("Failed to create cache file in '{}': {source}", dir.display())]
    Create {
        /// Directory the file was meant to live in.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A writer handle for the cache could not be produced.
    #[error("Failed to open writer for cache '{}': {source}", path.display())]
    Writer {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cache was already closed when a writer was requested.
    #[error("Cache '{}' is closed", path.display())]
    Closed {
        /// Cache file path.
        path: PathBuf,
    },
}

/// Errors from a log source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Docker is not reachable.
    #[error("Docker not available: {reason}")]
    DockerNotAvailable {
        /// Reason why Docker is unavailable.
        reason: String,
    },

    /// Listing containers failed.
    #[error("Failed to list containers: {reason}")]
    ListFailed {
        /// Reason for failure.
        reason: String,
    },

    /// There is nothing to show.
    #[error("No containers found (use --all to include stopped containers)")]
    NoContainers,

    /// The requested initial container does not exist.
    #[error("Container '{name}' not found")]
    ContainerNotFound {
        /// Requested name or id.
        name: String,
    },
}

/// Errors from the document viewer.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// A document could not be opened.
    #[error("Failed to open document '{}': {source}", path.display())]
    Open {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A key name could not be parsed.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey {
        /// The key as written.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A key is already bound to another action.
    #[error("Key '{key}' is already bound to {bound}")]
    KeyInUse {
        /// The key as written.
        key: String,
        /// Name of the action or built-in that owns it.
        bound: String,
    },

    /// Terminal setup, drawing or input failed.
    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}
