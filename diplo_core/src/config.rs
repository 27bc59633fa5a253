//! Dashboard configuration.
//!
//! Loaded from `dashboard_config.json`, overridable through `DIPLOSENSE_CONFIG_PATH`.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const BUILTIN_DASHBOARD_CONFIG: &str = include_str!("data/dashboard_config.json");
pub const CONFIG_PATH_ENV: &str = "DIPLOSENSE_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_base: String,
    pub ws_base: String,
    pub default_meeting_id: String,
    /// Maximum retained events; 0 keeps everything.
    pub history_limit: usize,
    pub activity_feed_len: usize,
    pub timeouts: TimeoutConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            ws_base: "ws://localhost:8000/ws".to_string(),
            default_meeting_id: "demo-meeting".to_string(),
            history_limit: 0,
            activity_feed_len: 10,
            timeouts: TimeoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub request_secs: u64,
    pub upload_secs: u64,
    pub url_fetch_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upload_secs: 120,
            url_fetch_secs: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }

    pub fn url_fetch(&self) -> Duration {
        Duration::from_secs(self.url_fetch_secs)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse dashboard config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read dashboard config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid {field} url {value:?}: {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl DashboardConfig {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_DASHBOARD_CONFIG)
            .expect("builtin dashboard config should parse successfully")
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn ws_base_url(&self) -> Result<Url, ConfigError> {
        parse_url("ws_base", &self.ws_base)
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        parse_url("api_base", &self.api_base)
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })
}

/// Load configuration from `explicit`, else the env override, else the builtin copy.
///
/// Returns the path the configuration was read from, if any.
pub fn load_dashboard_config(explicit: Option<&Path>) -> (DashboardConfig, Option<PathBuf>) {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

    if let Some(path) = path {
        match DashboardConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "diplosense::config",
                    path = %path.display(),
                    "dashboard_config.loaded=file"
                );
                return (config, Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "diplosense::config",
                    path = %path.display(),
                    error = %err,
                    "dashboard_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "diplosense::config", "dashboard_config.loaded=builtin");
    (DashboardConfig::builtin(), None)
}

pub fn load_dashboard_config_from_env() -> (DashboardConfig, Option<PathBuf>) {
    load_dashboard_config(None)
}
