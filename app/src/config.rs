//! FILENAME: app/src/config.rs
// PURPOSE: Host configuration, read once at startup from an optional JSON file.

use std::path::{Path, PathBuf};

use herd_analytics::AnalyticsDefinition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::log_info;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "HERD_DASHBOARD_CONFIG";

/// Records listed by a drill-down when the request sets no limit.
pub const DEFAULT_DRILL_DOWN_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Snapshot loaded at startup when none is given on the command line.
    pub snapshot_path: Option<PathBuf>,

    /// Directory of the unified log file. Console only when unset.
    pub log_dir: Option<PathBuf>,

    pub drill_down_limit: usize,

    pub definition: AnalyticsDefinition,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            snapshot_path: None,
            log_dir: None,
            drill_down_limit: DEFAULT_DRILL_DOWN_LIMIT,
            definition: AnalyticsDefinition::default(),
        }
    }
}

impl DashboardConfig {
    /// Path given explicitly, else the one named by `HERD_DASHBOARD_CONFIG`.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    /// Reads the configuration file. A path that does not exist yields the
    /// defaults; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log_info!("CONFIG", "no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DashboardConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        log_info!(
            "CONFIG",
            "loaded {:?} charts={} age_buckets={}",
            path,
            config.definition.charts.len(),
            config.definition.age_buckets.len()
        );
        Ok(config)
    }

    /// Loads from the resolved path, or returns the defaults when none is set.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::resolve_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
