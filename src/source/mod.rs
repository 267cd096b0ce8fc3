//! Log sources: where the bytes in a cache file come from.
//!
//! A [`LogSource`] keeps a list of containers and a pointer to the current
//! one. [`LogSource::load`] starts streaming the current container's logs
//! into a file on a background task and returns immediately; the session
//! calls [`LogSource::stop`] before it deletes that file.

mod docker;

pub use docker::{DockerSource, SourceOptions, connect_docker};

use std::fmt;
use std::fs::File;
use std::str::FromStr;

use tokio_util::sync::CancellationToken;

/// How much history to request before following new output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// The last `n` lines. `Last(0)` starts empty and only shows new output.
    Last(usize),
    /// Everything the runtime still has.
    All,
}

impl Tail {
    /// The value Docker's `tail` query parameter expects.
    pub fn as_docker_arg(&self) -> String {
        match self {
            Tail::Last(n) => n.to_string(),
            Tail::All => "all".to_string(),
        }
    }
}

impl Default for Tail {
    fn default() -> Self {
        Tail::Last(1000)
    }
}

impl fmt::Display for Tail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tail::Last(n) => write!(f, "{n}"),
            Tail::All => write!(f, "all"),
        }
    }
}

impl FromStr for Tail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Tail::All);
        }
        s.parse::<usize>()
            .map(Tail::Last)
            .map_err(|_| format!("expected a line count or 'all', got '{s}'"))
    }
}

/// A provider of container logs.
///
/// Implementations are shared for the whole session, so every method takes
/// `&self` and synchronises internally.
pub trait LogSource: Send + Sync {
    /// Start streaming the current container into `sink` without blocking.
    ///
    /// Streaming stops when `scope` is cancelled, when [`stop`](Self::stop)
    /// is called, or when writing to `sink` fails.
    fn load(&self, scope: &CancellationToken, sink: File, tail: Tail);

    /// Halt streaming into the current destination.
    fn stop(&self);

    /// Move the current-container pointer backwards.
    fn set_prev_container(&self);

    /// Move the current-container pointer forwards.
    fn set_next_container(&self);

    /// Display name of the current container.
    fn name(&self) -> String;
}

/// A container a source can stream from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Engine id.
    pub id: String,
    /// Display name without the leading slash Docker adds.
    pub name: String,
}

impl ContainerEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Whether `query` names this container (exact name or id prefix).
    pub fn matches(&self, query: &str) -> bool {
        self.name == query.trim_start_matches('/') || (!query.is_empty() && self.id.starts_with(query))
    }
}

/// An ordered container list with a wrapping cursor.
#[derive(Debug, Clone)]
pub struct ContainerList {
    entries: Vec<ContainerEntry>,
    current: usize,
}

impl ContainerList {
    /// Build a list sorted by name. Returns `None` when empty.
    pub fn new(mut entries: Vec<ContainerEntry>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Some(Self {
            entries,
            current: 0,
        })
    }

    /// Point at the first container matching `query`.
    pub fn select(&mut self, query: &str) -> bool {
        match self.entries.iter().position(|e| e.matches(query)) {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> &ContainerEntry {
        &self.entries[self.current]
    }

    /// Step back, wrapping from the first entry to the last.
    pub fn prev(&mut self) {
        self.current = (self.current + self.entries.len() - 1) % self.entries.len();
    }

    /// Step forward, wrapping from the last entry to the first.
    pub fn next(&mut self) {
        self.current = (self.current + 1) % self.entries.len();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
