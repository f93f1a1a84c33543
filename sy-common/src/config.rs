//! Configuration loading and database path resolution
//!
//! Process-chain definitions live here rather than in code: a chain
//! change is a config edit, not a redeploy. Compiled defaults match the
//! chains currently run on the floor.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Aggregation configuration, loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path to the SQLite database holding the event log and summaries
    pub database_path: Option<PathBuf>,

    /// Service flows excluded from production metrics (rework, sorting)
    pub excluded_service_flows: Vec<String>,

    /// The terminal station a unit must reach to count as completed
    pub terminal_station: String,

    /// Models tracked for model-specific yield and TPY
    pub tracked_models: Vec<String>,

    /// Ordered station chain per model, used by the fixed TPY strategy
    pub chains: BTreeMap<String, Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(
            "Tesla SXM4".to_string(),
            vec!["VI2".into(), "ASSY2".into(), "FI".into(), "FQC".into()],
        );
        chains.insert(
            "Tesla SXM5".to_string(),
            vec!["BBD".into(), "ASSY2".into(), "FI".into(), "FQC".into()],
        );
        AppConfig {
            database_path: None,
            excluded_service_flows: vec!["NC Sort".to_string(), "RO".to_string()],
            terminal_station: "PACKING".to_string(),
            tracked_models: vec!["Tesla SXM4".to_string(), "Tesla SXM5".to_string()],
            chains,
        }
    }
}

impl AppConfig {
    /// Load configuration following the resolution order:
    /// 1. Explicit path (from the command line)
    /// 2. Per-user config file (`<config dir>/station-yield/config.toml`)
    /// 3. Compiled defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Some(path) = default_config_file() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(AppConfig::default())
    }

    /// Parse a config file; a missing or malformed file is an error here
    /// because the caller asked for this path explicitly.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))
    }

    /// Ordered station chain for a model, if one is configured
    pub fn chain_for(&self, model: &str) -> Option<&[String]> {
        self.chains.get(model).map(|c| c.as_slice())
    }
}

/// Resolve the database path with the standard priority order:
/// 1. Command-line argument
/// 2. `SY_DATABASE` environment variable
/// 3. `database_path` in the config file
/// 4. OS-dependent compiled default
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &AppConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("SY_DATABASE") {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.database_path {
        return path.clone();
    }

    default_database_path()
}

/// Default per-user config file location
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("station-yield").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("station-yield").join("sy.db"))
        .unwrap_or_else(|| PathBuf::from("./sy.db"))
}
