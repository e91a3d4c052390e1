//! Runtime settings shared by the CLI and integration tests.
//!
//! Centralizes environment lookups and logging setup so every entry point
//! resolves the configuration and snapshot directories the same way. Flags
//! passed on the command line take precedence over the environment.

use anyhow::{Result, bail};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const CONF_DIR_ENV: &str = "CATALOG_CONF_DIR";
pub const SNAPSHOT_DIR_ENV: &str = "CATALOG_SNAPSHOT_DIR";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSettings {
    pub config_dir: PathBuf,
    /// `None` selects authoring mode.
    pub snapshot_dir: Option<PathBuf>,
}

impl CatalogSettings {
    /// Resolve settings from explicit overrides, falling back to
    /// `CATALOG_CONF_DIR` / `CATALOG_SNAPSHOT_DIR`.
    pub fn resolve(config_dir: Option<PathBuf>, snapshot_dir: Option<PathBuf>) -> Result<Self> {
        let Some(config_dir) = config_dir.or_else(|| env_path(CONF_DIR_ENV)) else {
            bail!("No configuration directory given. Pass --conf or set {CONF_DIR_ENV}.");
        };
        if !config_dir.is_dir() {
            bail!("Configuration directory {} does not exist", config_dir.display());
        }
        Ok(Self {
            config_dir,
            snapshot_dir: snapshot_dir.or_else(|| env_path(SNAPSHOT_DIR_ENV)),
        })
    }
}

/// Non-empty environment variable as a path.
pub fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
