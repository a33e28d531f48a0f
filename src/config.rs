//! Application configuration management.
//!
//! Handles config directory resolution (CLI flag / env > `XDG_CONFIG_HOME` >
//! `~/.config/kvc-indicator`) and loading `config.toml`. This is the
//! indicator's own settings file, not the Kerio client's `/etc/kerio-kvc.conf`
//! (see [`crate::core::kvc_config`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::state::ConnectCriterion;

/// User-configurable application settings.
///
/// All fields have defaults. Users can override any subset via `config.toml`
/// in the config directory; missing fields use defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Dashboard tick rate in milliseconds.
    pub tick_rate: u64,
    /// Seconds between connection polls.
    pub poll_interval_secs: u64,
    /// Seconds between a dropped connection and the auto-reconnect attempt.
    pub reconnect_delay_secs: u64,
    /// Seconds between stop and start during a manual reconnect.
    pub reconnect_after_disconnect_secs: u64,
    /// Seconds an auto-reconnect attempt gets before the next is queued.
    pub reconnect_settle_secs: u64,
    /// Unattended reconnect attempts per disconnection episode.
    pub max_reconnect_attempts: u32,
    /// Whether auto-reconnect starts enabled.
    pub auto_reconnect: bool,
    /// Timeout for status queries in seconds.
    pub query_timeout_secs: u64,
    /// Timeout for service control and privileged file commands in seconds.
    pub control_timeout_secs: u64,
    /// systemd unit of the Kerio client.
    pub service_name: String,
    /// Tunnel interface created by the client.
    pub interface: String,
    /// Path of the Kerio client's connection configuration.
    pub kvc_config_path: PathBuf,
    /// Run control commands and privileged file operations through `sudo`.
    pub use_sudo: bool,
    /// Send desktop notifications via `notify-send`.
    pub notifications: bool,
    /// What counts as connected: `"address"` or `"interface"`.
    pub connect_criterion: ConnectCriterion,
    /// Minimum log level (`"debug"`, `"info"`, `"warning"`, `"error"`).
    pub log_level: String,
    /// Maximum number of log entries kept in memory.
    pub max_log_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate: constants::DEFAULT_TICK_RATE,
            poll_interval_secs: constants::DEFAULT_POLL_INTERVAL_SECS,
            reconnect_delay_secs: constants::DEFAULT_RECONNECT_DELAY_SECS,
            reconnect_after_disconnect_secs: constants::DEFAULT_RECONNECT_AFTER_DISCONNECT_SECS,
            reconnect_settle_secs: constants::DEFAULT_RECONNECT_SETTLE_SECS,
            max_reconnect_attempts: constants::MAX_RECONNECT_ATTEMPTS,
            auto_reconnect: true,
            query_timeout_secs: constants::DEFAULT_QUERY_TIMEOUT_SECS,
            control_timeout_secs: constants::DEFAULT_CONTROL_TIMEOUT_SECS,
            service_name: constants::DEFAULT_SERVICE_NAME.to_string(),
            interface: constants::DEFAULT_VPN_INTERFACE.to_string(),
            kvc_config_path: PathBuf::from(constants::DEFAULT_KVC_CONFIG_PATH),
            use_sudo: true,
            notifications: true,
            connect_criterion: ConnectCriterion::default(),
            log_level: constants::DEFAULT_LOG_LEVEL.to_string(),
            max_log_entries: constants::DEFAULT_MAX_LOG_ENTRIES,
        }
    }
}

impl AppConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }
}

/// Resolves the config directory path.
///
/// Precedence: CLI flag / `KVC_INDICATOR_CONFIG_DIR` > `XDG_CONFIG_HOME` > default.
/// The directory is created if missing.
///
/// # Errors
///
/// Returns an error if the config directory cannot be determined or created.
pub fn resolve_config_dir(cli_override: Option<&PathBuf>) -> std::io::Result<PathBuf> {
    let path = if let Some(dir) = cli_override {
        if dir.is_relative() {
            std::env::current_dir()?.join(dir)
        } else {
            dir.clone()
        }
    } else {
        default_config_dir()?
    };

    std::fs::create_dir_all(&path)?;
    std::fs::canonicalize(&path)
}

fn default_config_dir() -> std::io::Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let xdg_path = PathBuf::from(xdg);
        if xdg_path.is_absolute() {
            return Ok(xdg_path.join(constants::APP_NAME));
        }
    }

    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "Home directory not found")
    })?;
    Ok(home.join(".config").join(constants::APP_NAME))
}

/// Loads `AppConfig` from `config.toml` in the given directory.
///
/// Returns defaults if the file doesn't exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(config_dir: &Path) -> Result<AppConfig, String> {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read {}: {e}", config_path.display()))?;

    toml::from_str(&content)
        .map_err(|e| format!("Invalid config at {}: {e}", config_path.display()))
}
