//! Error types for the viewing session.

use thiserror::Error;

use crate::error::{CacheError, ViewerError};
use crate::viewer::Action;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures inside one create-cycle (allocate, stream, open).
#[derive(Debug, Error)]
pub enum CycleError {
    /// The cache file could not be allocated or written to.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The cache could not be opened as a document.
    #[error(transparent)]
    Open(#[from] ViewerError),
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A create-cycle failed.
    #[error("Failed to create document: {0}")]
    CreateDocument(#[source] CycleError),

    /// The viewer could not be constructed.
    #[error("Failed to create viewer: {0}")]
    CreateViewer(#[source] ViewerError),

    /// A key binding was rejected.
    #[error("Failed to bind {action} key: {source}")]
    BindKey {
        /// Action being bound.
        action: Action,
        /// Why the viewer refused it.
        #[source]
        source: ViewerError,
    },

    /// The viewer loop failed.
    #[error("Failed to run viewer: {0}")]
    Run(#[source] ViewerError),

    /// A create-cycle failed outside of `new_document`.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// An operation needs a running viewer.
    #[error("Session is not running")]
    NotRunning,

    /// A key action failed with no way back to the user; the session ends.
    #[error("Fatal error in {action}: {source}")]
    Fatal {
        /// Action that was being handled.
        action: Action,
        /// What went wrong.
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// Whether this came from an interactive action rather than startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Fatal { .. })
    }

    pub(crate) fn fatal(action: Action, source: SessionError) -> Self {
        SessionError::Fatal {
            action,
            source: Box::new(source),
        }
    }
}
