//! Configuration resolved from CLI flags, environment and `.env`.
//!
//! Precedence for every setting: command-line flag, then `DLOG_*`
//! environment variable, then the built-in default.
//!
//! | Setting | Flag | Env | Default |
//! |---|---|---|---|
//! | tail | `--tail` | `DLOG_TAIL` | `1000` |
//! | include stopped | `--all` | `DLOG_ALL_CONTAINERS` | `false` |
//! | timestamps | `--timestamps` | `DLOG_TIMESTAMPS` | `false` |
//! | log file | `--log-file` | `DLOG_LOG_FILE` | `<tmp>/dlog.log` |
//! | log level | `--debug` | `DLOG_LOG_LEVEL` | `dlog=info` |
//! | cache dir | `--cache-dir` | `DLOG_CACHE_DIR` | system temp dir |

mod helpers;

pub use helpers::{optional_env, parse_bool, parse_optional, parse_value};

use std::path::PathBuf;

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::source::{SourceOptions, Tail};

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Lines of history on normal loads.
    pub tail: Tail,
    /// Include stopped containers in the rotation.
    pub all_containers: bool,
    /// Prefix lines with engine timestamps.
    pub timestamps: bool,
    /// Container to show first.
    pub container: Option<String>,
    /// Where tracing output goes.
    pub log_file: PathBuf,
    /// Filter directive from the environment.
    pub log_level: Option<String>,
    /// `--debug` was passed.
    pub debug: bool,
    /// Directory for cache files.
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            tail: Tail::default(),
            all_containers: false,
            timestamps: false,
            container: None,
            log_file: tmp.join("dlog.log"),
            log_level: None,
            debug: false,
            cache_dir: tmp,
        }
    }
}

impl Config {
    /// Resolve from the process environment and `cli`.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        Self::build(cli, optional_env)
    }

    /// Resolve with a custom variable lookup.
    pub fn build(
        cli: &Cli,
        env: impl Fn(&str) -> Result<Option<String>, ConfigError>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let tail = match cli.tail {
            Some(tail) => tail,
            None => parse_optional("DLOG_TAIL", env("DLOG_TAIL")?, defaults.tail)?,
        };

        let all_containers =
            cli.all || parse_bool("DLOG_ALL_CONTAINERS", env("DLOG_ALL_CONTAINERS")?, false)?;
        let timestamps =
            cli.timestamps || parse_bool("DLOG_TIMESTAMPS", env("DLOG_TIMESTAMPS")?, false)?;

        let log_file = match &cli.log_file {
            Some(path) => path.clone(),
            None => env("DLOG_LOG_FILE")?
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        };

        let cache_dir = match &cli.cache_dir {
            Some(path) => path.clone(),
            None => env("DLOG_CACHE_DIR")?
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        };
        if !cache_dir.is_dir() {
            return Err(ConfigError::InvalidValue {
                key: "DLOG_CACHE_DIR".to_string(),
                message: format!("'{}' is not a directory", cache_dir.display()),
            });
        }

        Ok(Self {
            tail,
            all_containers,
            timestamps,
            container: cli.container.clone(),
            log_file,
            log_level: env("DLOG_LOG_LEVEL")?.filter(|l| !l.trim().is_empty()),
            debug: cli.debug,
            cache_dir,
        })
    }

    /// Options for connecting the Docker source.
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            all_containers: self.all_containers,
            timestamps: self.timestamps,
            initial: self.container.clone(),
        }
    }
}
