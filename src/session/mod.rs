//! Session controller.
//!
//! A [`Session`] ties one [`LogSource`](crate::source::LogSource) to one
//! viewer. Each document it shows is backed by a fresh cache file that the
//! source streams into; switching container or reloading the full history
//! retires the current cache and builds a new one (a "create-cycle").

mod error;
mod manager;

pub use error::{CycleError, Result, SessionError};
pub use manager::{KEY_BINDINGS, Session, SessionState};
