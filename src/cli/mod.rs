//! Command-line interface.
//!
//! Flags override the matching `DLOG_*` environment variables; see
//! [`crate::config`] for the full table.

use std::path::PathBuf;

use clap::{ColorChoice, Parser};

use crate::source::Tail;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "dlog")]
#[command(about = "Page through Docker container logs with live follow")]
#[command(
    long_about = "dlog streams a container's logs into a temporary file and shows it in a pager.\n\
                  Keys: left/right switch container, ctrl+y fetch the full log, s memory report, q quit.\n\
                  Examples:\n  dlog              # first container, last 1000 lines\n  dlog --tail all web\n  dlog --all --timestamps"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    /// Container name or id prefix to show first
    pub container: Option<String>,

    /// Lines of history to load: a number or "all"
    #[arg(short, long, value_name = "N|all")]
    pub tail: Option<Tail>,

    /// Include stopped containers
    #[arg(short, long)]
    pub all: bool,

    /// Prefix each line with the engine timestamp
    #[arg(long)]
    pub timestamps: bool,

    /// Write diagnostics to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Directory for cache files
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}
