//! Document viewer: a pager over a growing log file.
//!
//! The session talks to the viewer only through [`ViewerFactory`] and
//! [`DocumentViewer`]. Bound keys do not call back into the session;
//! instead [`DocumentViewer::run`] returns the bound [`Action`] and the
//! session dispatches it before running the viewer again. This keeps the
//! session's state machine outside the input loop.
//!
//! ```text
//!   Session::start
//!       │
//!       ▼
//!   ┌──────────────┐  RunOutcome::Action(a)  ┌───────────────────┐
//!   │ viewer.run() │────────────────────────▶│ Session::dispatch │
//!   │              │◀────────────────────────│  (retire/create)  │
//!   └──────────────┘        run again        └───────────────────┘
//!       │ RunOutcome::Quit
//!       ▼
//!   Session::shutdown
//! ```

pub mod document;
pub mod keys;
pub mod pager;

pub use document::Document;
pub use keys::KeyBinding;
pub use pager::{Pager, PagerFactory};

use std::fmt;
use std::path::Path;

use crate::error::ViewerError;

/// Logical actions a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PrevContainer,
    NextContainer,
    SystemReport,
    AllLogs,
}

impl Action {
    /// Stable identifier, used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Action::PrevContainer => "prevContainer",
            Action::NextContainer => "nextContainer",
            Action::SystemReport => "systemReport",
            Action::AllLogs => "allLogs",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Viewer-wide display options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct General {
    /// Keep the view pinned to the end of the document as it grows.
    pub follow_mode: bool,
    /// Wrap long lines instead of cutting them at the right edge.
    pub wrap_mode: bool,
}

/// Why [`DocumentViewer::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The user quit.
    Quit,
    /// A key bound with [`DocumentViewer::set_key_handler`] was pressed.
    Action(Action),
}

/// Builds documents and viewers.
pub trait ViewerFactory: Send {
    /// Open a file as a document.
    fn open_document(&self, path: &Path) -> Result<Document, ViewerError>;

    /// Create a viewer showing `document`.
    fn create(&self, document: Document) -> Result<Box<dyn DocumentViewer>, ViewerError>;
}

/// A running pager instance.
pub trait DocumentViewer: Send {
    /// Swap in a new backing document; the old one is dropped.
    fn replace_document(&mut self, document: Document);

    /// Caption of the document currently shown.
    fn caption(&self) -> &str;

    /// Set follow/wrap options.
    fn set_general(&mut self, general: General);

    /// Bind `keys` to `action`. Fails if a key is unparsable or taken.
    fn set_key_handler(&mut self, action: Action, keys: &[&str]) -> Result<(), ViewerError>;

    /// Run the input/render loop until the user quits or a bound key fires.
    fn run(&mut self) -> Result<RunOutcome, ViewerError>;

    /// Stop rendering and give the terminal back.
    fn close(&mut self);
}
