//! dlog - a terminal pager for Docker container logs.
//!
//! The crate is split along the collaborators of a viewing session:
//!
//! - [`cache`]: ephemeral on-disk buffers that hold streamed log output
//! - [`source`]: where log bytes come from (Docker via `bollard`)
//! - [`viewer`]: the pager that renders a cache file as a live document
//! - [`session`]: the controller that ties them together and owns cleanup
//! - [`diagnostics`]: on-demand memory report for debugging
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dlog::session::Session;
//! use dlog::source::{DockerSource, LogSource, SourceOptions, Tail};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = DockerSource::connect(SourceOptions::default()).await?;
//! let source: Arc<dyn LogSource> = Arc::new(source);
//!
//! let mut session = Session::new(source, Tail::Last(1000));
//! let result = session.start();
//! session.shutdown();
//! result?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod session;
pub mod source;
pub mod viewer;
