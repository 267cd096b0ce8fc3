//! Config round-trip tests.
//!
//! Writes a `.env` file into a tempdir, reads it back with dotenvy and feeds
//! the result through `Config::build`, the same path `main` takes after
//! `dotenvy::dotenv()` has populated the environment.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use clap::Parser;
use tempfile::tempdir;

use dlog::cli::Cli;
use dlog::config::Config;
use dlog::error::ConfigError;
use dlog::source::Tail;

fn read_env_map(path: &Path) -> HashMap<String, String> {
    dotenvy::from_path_iter(path)
        .expect("dotenvy should parse the .env file")
        .filter_map(|r| r.ok())
        .collect()
}

fn write_env(path: &Path, lines: &[&str]) {
    let mut file = std::fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn resolve(args: &[&str], vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
    let cli = Cli::try_parse_from(std::iter::once("dlog").chain(args.iter().copied())).unwrap();
    Config::build(&cli, |key| Ok(vars.get(key).cloned()))
}

#[test]
fn dotenv_values_reach_config() {
    let dir = tempdir().unwrap();
    let env_path = dir.path().join(".env");
    let cache_dir = dir.path().join("caches");
    std::fs::create_dir(&cache_dir).unwrap();

    write_env(
        &env_path,
        &[
            "# dlog settings",
            "DLOG_TAIL=250",
            "DLOG_ALL_CONTAINERS=true",
            "DLOG_TIMESTAMPS=off",
            "DLOG_LOG_LEVEL=\"dlog=debug\"",
            &format!("DLOG_CACHE_DIR={}", cache_dir.display()),
        ],
    );

    let map = read_env_map(&env_path);
    let config = resolve(&[], &map).unwrap();

    assert_eq!(config.tail, Tail::Last(250));
    assert!(config.all_containers);
    assert!(!config.timestamps);
    assert_eq!(config.log_level.as_deref(), Some("dlog=debug"));
    assert_eq!(config.cache_dir, cache_dir);
}

#[test]
fn flags_win_over_dotenv() {
    let dir = tempdir().unwrap();
    let env_path = dir.path().join(".env");
    write_env(&env_path, &["DLOG_TAIL=all", "DLOG_TIMESTAMPS=no"]);

    let map = read_env_map(&env_path);
    let config = resolve(&["--tail", "0", "--timestamps", "api"], &map).unwrap();

    assert_eq!(config.tail, Tail::Last(0), "explicit zero must not become all");
    assert!(config.timestamps);
    assert_eq!(config.source_options().initial.as_deref(), Some("api"));
}

#[test]
fn bad_dotenv_value_names_the_key() {
    let dir = tempdir().unwrap();
    let env_path = dir.path().join(".env");
    write_env(&env_path, &["DLOG_ALL_CONTAINERS=perhaps"]);

    let map = read_env_map(&env_path);
    let err = resolve(&[], &map).unwrap_err();

    assert!(
        err.to_string().contains("DLOG_ALL_CONTAINERS"),
        "error should name the variable: {err}"
    );
}
