//! Configuration management for FocusFlow Timer
//!
//! Handles environment variables and application settings.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::models::{OverlaySize, Viewport};
use crate::services::drag_position::SnapSettings;
use crate::services::timer_service::TimerSettings;

const ENV_PREFIX: &str = "FOCUSFLOW_";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Base URL of the application API that records study sessions
    pub api_base_url: String,

    /// Session cookie forwarded to the API, if any
    pub auth_cookie: Option<String>,

    /// Directory holding the durable timer state
    pub data_dir: PathBuf,

    /// File name of the durable timer state inside `data_dir`
    pub storage_file: String,

    /// Commit timeout in seconds
    pub commit_timeout: u64,

    /// Display refresh interval in milliseconds
    pub refresh_interval_ms: u64,

    /// Write the session record on every display refresh
    pub persist_on_tick: bool,

    /// Edge snapping distance in pixels
    pub snap_threshold: f64,

    /// Gap to a snapped edge in pixels
    pub snap_margin: f64,

    /// Where to navigate after a committed session
    pub results_route: String,

    /// Environment (development, production)
    pub environment: String,

    /// Log level
    pub log_level: String,

    /// Emit JSON logs in addition to the console output
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4100,
            api_base_url: "http://localhost:3000".to_string(),
            auth_cookie: None,
            data_dir: PathBuf::from("./data"),
            storage_file: "timer-state.json".to_string(),
            commit_timeout: 10,
            refresh_interval_ms: 100,
            persist_on_tick: true,
            snap_threshold: 48.0,
            snap_margin: 16.0,
            results_route: "/dashboard/analytics".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source. `lookup`
    /// receives full variable names such as `FOCUSFLOW_PORT`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = var("HOST") {
            config.host = host;
        }

        if let Some(port) = var("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }

        // Session store
        if let Some(api_base_url) = var("API_BASE_URL") {
            config.api_base_url = api_base_url;
        }

        if let Some(cookie) = var("AUTH_COOKIE") {
            config.auth_cookie = Some(cookie).filter(|c| !c.trim().is_empty());
        }

        if let Some(timeout) = var("COMMIT_TIMEOUT") {
            config.commit_timeout = parse_number(timeout, ConfigError::InvalidCommitTimeout)?;
        }

        // Storage
        if let Some(data_dir) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Some(storage_file) = var("STORAGE_FILE") {
            config.storage_file = storage_file;
        }

        // Timer behavior
        if let Some(interval) = var("REFRESH_INTERVAL_MS") {
            config.refresh_interval_ms = parse_number(interval, ConfigError::InvalidRefreshInterval)?;
        }

        if let Some(persist) = var("PERSIST_ON_TICK") {
            config.persist_on_tick = parse_number(persist, ConfigError::InvalidBool)?;
        }

        if let Some(route) = var("RESULTS_ROUTE") {
            config.results_route = route;
        }

        // Overlay snapping
        if let Some(threshold) = var("SNAP_THRESHOLD") {
            config.snap_threshold = parse_number(threshold, ConfigError::InvalidSnap)?;
        }

        if let Some(margin) = var("SNAP_MARGIN") {
            config.snap_margin = parse_number(margin, ConfigError::InvalidSnap)?;
        }

        // Environment and logging
        if let Some(environment) = var("ENVIRONMENT") {
            config.environment = environment;
        }

        if let Some(log_level) = var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Some(json_logs) = var("JSON_LOGS") {
            config.json_logs = parse_number(json_logs, ConfigError::InvalidBool)?;
        }

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }

        self.api_url()?;

        if self.commit_timeout == 0 {
            return Err(ConfigError::InvalidCommitTimeout(
                self.commit_timeout.to_string(),
            ));
        }

        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidRefreshInterval(
                self.refresh_interval_ms.to_string(),
            ));
        }

        if !(self.snap_threshold.is_finite() && self.snap_threshold >= 0.0) {
            return Err(ConfigError::InvalidSnap(self.snap_threshold.to_string()));
        }

        if !(self.snap_margin.is_finite() && self.snap_margin >= 0.0) {
            return Err(ConfigError::InvalidSnap(self.snap_margin.to_string()));
        }

        if self.snap_margin > self.snap_threshold {
            return Err(ConfigError::SnapMarginExceedsThreshold {
                margin: self.snap_margin,
                threshold: self.snap_threshold,
            });
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }

        if self.storage_file.trim().is_empty() {
            return Err(ConfigError::EmptyStorageFile);
        }

        if !self.results_route.starts_with('/') {
            return Err(ConfigError::InvalidResultsRoute(self.results_route.clone()));
        }

        Ok(())
    }

    /// Parsed API base URL
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| ConfigError::InvalidApiBaseUrl(format!("{}: {e}", self.api_base_url)))?;

        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(ConfigError::InvalidApiBaseUrl(self.api_base_url.clone()));
        }

        Ok(url)
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Full path of the durable state file
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage_file)
    }

    /// The settings the timer state machine runs with
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            commit_timeout: self.commit_timeout(),
            persist_on_tick: self.persist_on_tick,
            results_route: self.results_route.clone(),
            viewport: Viewport::default(),
            overlay_size: OverlaySize::default(),
            snap: SnapSettings {
                threshold: self.snap_threshold,
                margin: self.snap_margin,
            },
        }
    }

    /// Create data directory if it doesn't exist
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| ConfigError::DataDirCreationFailed(e.to_string()))?;
        Ok(())
    }

    /// Log configuration (excluding sensitive data)
    pub fn log_config(&self) {
        info!("Configuration loaded:");
        info!("  Environment: {}", self.environment);
        info!("  Bind address: {}", self.bind_address());
        info!("  API base URL: {}", self.api_base_url);
        info!("  Auth cookie: {}", self.masked_auth_cookie());
        info!("  Storage file: {:?}", self.storage_path());
        info!("  Commit timeout: {}s", self.commit_timeout);
        info!("  Refresh interval: {}ms", self.refresh_interval_ms);
        info!("  Persist on tick: {}", self.persist_on_tick);
        info!(
            "  Overlay snapping: threshold {}px, margin {}px",
            self.snap_threshold, self.snap_margin
        );
        info!("  Results route: {}", self.results_route);
        info!("  Log level: {}", self.log_level);

        if self.is_production() && self.auth_cookie.is_none() {
            warn!("No auth cookie configured, the API may reject committed sessions");
        }
    }

    fn masked_auth_cookie(&self) -> &'static str {
        if self.auth_cookie.is_some() {
            "***"
        } else {
            "(none)"
        }
    }
}

fn parse_number<T, E>(raw: String, err: E) -> Result<T, ConfigError>
where
    T: FromStr,
    E: FnOnce(String) -> ConfigError,
{
    match raw.trim().parse() {
        Ok(value) => Ok(value),
        Err(_) => Err(err(raw)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid API base URL: {0}")]
    InvalidApiBaseUrl(String),

    #[error("Invalid commit timeout: {0}")]
    InvalidCommitTimeout(String),

    #[error("Invalid refresh interval: {0}")]
    InvalidRefreshInterval(String),

    #[error("Invalid snap setting: {0}")]
    InvalidSnap(String),

    #[error("Snap margin {margin} exceeds snap threshold {threshold}")]
    SnapMarginExceedsThreshold { margin: f64, threshold: f64 },

    #[error("Invalid boolean value: {0}")]
    InvalidBool(String),

    #[error("Invalid results route (must start with '/'): {0}")]
    InvalidResultsRoute(String),

    #[error("Empty data directory")]
    EmptyDataDir,

    #[error("Empty storage file name")]
    EmptyStorageFile,

    #[error("Data directory creation failed: {0}")]
    DataDirCreationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4100);
        assert_eq!(config.commit_timeout, 10);
        assert!(config.persist_on_tick);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = load(&[
            ("FOCUSFLOW_PORT", "8080"),
            ("FOCUSFLOW_API_BASE_URL", "https://focusflow.example.com"),
            ("FOCUSFLOW_AUTH_COOKIE", "session=abc"),
            ("FOCUSFLOW_COMMIT_TIMEOUT", "3"),
            ("FOCUSFLOW_PERSIST_ON_TICK", "false"),
            ("FOCUSFLOW_SNAP_MARGIN", "8"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.auth_cookie.as_deref(), Some("session=abc"));
        assert_eq!(config.commit_timeout(), Duration::from_secs(3));
        assert!(!config.persist_on_tick);
        assert_eq!(config.snap_margin, 8.0);
    }

    #[test]
    fn test_blank_cookie_means_none() {
        let config = load(&[("FOCUSFLOW_AUTH_COOKIE", "  ")]).unwrap();
        assert_eq!(config.auth_cookie, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("FOCUSFLOW_PORT", "0")]),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_PORT", "http")]),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_API_BASE_URL", "ftp://example.com")]),
            Err(ConfigError::InvalidApiBaseUrl(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_API_BASE_URL", "not a url")]),
            Err(ConfigError::InvalidApiBaseUrl(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_COMMIT_TIMEOUT", "0")]),
            Err(ConfigError::InvalidCommitTimeout(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_REFRESH_INTERVAL_MS", "0")]),
            Err(ConfigError::InvalidRefreshInterval(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_SNAP_MARGIN", "60")]),
            Err(ConfigError::SnapMarginExceedsThreshold { .. })
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_JSON_LOGS", "yes")]),
            Err(ConfigError::InvalidBool(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_RESULTS_ROUTE", "dashboard")]),
            Err(ConfigError::InvalidResultsRoute(_))
        ));
        assert!(matches!(
            load(&[("FOCUSFLOW_STORAGE_FILE", "")]),
            Err(ConfigError::EmptyStorageFile)
        ));
    }

    #[test]
    fn test_helper_methods() {
        let config = Config::default();

        assert_eq!(config.bind_address(), "127.0.0.1:4100");
        assert_eq!(config.storage_path(), PathBuf::from("./data/timer-state.json"));
        assert_eq!(config.refresh_interval(), Duration::from_millis(100));
        assert_eq!(config.masked_auth_cookie(), "(none)");
        assert!(!config.is_production());
    }

    #[test]
    fn test_timer_settings_follow_config() {
        let mut config = Config::default();
        config.commit_timeout = 4;
        config.results_route = "/stats".to_string();
        config.snap_threshold = 30.0;

        let settings = config.timer_settings();

        assert_eq!(settings.commit_timeout, Duration::from_secs(4));
        assert_eq!(settings.results_route, "/stats");
        assert_eq!(settings.snap.threshold, 30.0);
        assert_eq!(settings.snap.margin, 16.0);
    }

    #[test]
    fn test_ensure_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().join("nested").join("state");

        config.ensure_data_dir().unwrap();

        assert!(config.data_dir.is_dir());
    }
}
