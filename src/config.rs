//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "JIGSAW_BACK_CONFIG_PATH";

const DEFAULT_ASSETS_DIR: &str = "images";
const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_WS_IDLE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_GRID_SIDE: usize = 64;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    assets_dir: PathBuf,
    prune_interval: Duration,
    orphan_grace: Duration,
    ws_idle_timeout: Duration,
    max_grid_side: usize,
    max_upload_bytes: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        assets_dir = %app_config.assets_dir.display(),
                        prune_interval_secs = app_config.prune_interval.as_secs(),
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Directory holding one sub-directory of assets per puzzle.
    pub fn assets_dir(&self) -> &PathBuf {
        &self.assets_dir
    }

    /// Period of the puzzle and user sweepers.
    pub fn prune_interval(&self) -> Duration {
        self.prune_interval
    }

    /// How long an uploaded picture survives without becoming a puzzle.
    pub fn orphan_grace(&self) -> Duration {
        self.orphan_grace
    }

    /// Websocket connections silent for longer than this are closed.
    pub fn ws_idle_timeout(&self) -> Duration {
        self.ws_idle_timeout
    }

    /// Largest number of rows or columns a puzzle may have.
    pub fn max_grid_side(&self) -> usize {
        self.max_grid_side
    }

    /// Upper bound on an uploaded picture, in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Same configuration with assets stored under `dir`.
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    assets_dir: Option<PathBuf>,
    prune_interval_secs: Option<u64>,
    orphan_grace_secs: Option<u64>,
    ws_idle_timeout_secs: Option<u64>,
    max_grid_side: Option<usize>,
    max_upload_bytes: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let prune_interval_secs = value
            .prune_interval_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PRUNE_INTERVAL_SECS);
        Self {
            assets_dir: value
                .assets_dir
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
            prune_interval: Duration::from_secs(prune_interval_secs),
            orphan_grace: Duration::from_secs(
                value.orphan_grace_secs.unwrap_or(prune_interval_secs),
            ),
            ws_idle_timeout: Duration::from_secs(
                value
                    .ws_idle_timeout_secs
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_WS_IDLE_TIMEOUT_SECS),
            ),
            max_grid_side: value
                .max_grid_side
                .filter(|side| *side > 0)
                .unwrap_or(DEFAULT_MAX_GRID_SIDE),
            max_upload_bytes: value
                .max_upload_bytes
                .filter(|bytes| *bytes > 0)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.assets_dir(), &PathBuf::from("images"));
        assert_eq!(config.prune_interval(), Duration::from_secs(43_200));
        assert_eq!(config.orphan_grace(), config.prune_interval());
        assert_eq!(config.ws_idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.max_grid_side(), 64);
    }

    #[test]
    fn partial_documents_keep_remaining_defaults() {
        let config =
            AppConfig::from_json(r#"{ "assets_dir": "/srv/pictures", "prune_interval_secs": 30 }"#)
                .unwrap();
        assert_eq!(config.assets_dir(), &PathBuf::from("/srv/pictures"));
        assert_eq!(config.prune_interval(), Duration::from_secs(30));
        assert_eq!(config.orphan_grace(), Duration::from_secs(30));
        assert_eq!(config.max_grid_side(), 64);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let config =
            AppConfig::from_json(r#"{ "prune_interval_secs": 0, "max_grid_side": 0 }"#).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(AppConfig::from_json(r#"{ "max_grid_side": "big" }"#).is_err());
    }
}
