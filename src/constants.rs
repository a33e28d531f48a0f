//! Application-wide constants and configuration defaults.
//!
//! This module defines the static values used throughout kvc-indicator,
//! including timing intervals, Kerio client paths, and user-facing messages.

use std::time::Duration;

// === Application Metadata ===

/// Application name (from Cargo.toml).
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
/// Current application version (from Cargo.toml).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// === Kerio Client ===

/// systemd unit that runs the Kerio VPN client daemon.
pub const DEFAULT_SERVICE_NAME: &str = "kerio-kvc.service";
/// Virtual interface created by the client while a tunnel is up.
pub const DEFAULT_VPN_INTERFACE: &str = "kvnet";
/// Persisted connection configuration read by the client.
pub const DEFAULT_KVC_CONFIG_PATH: &str = "/etc/kerio-kvc.conf";
/// Port used when the configuration does not name one.
pub const DEFAULT_KVC_PORT: u16 = 4090;

// === Timing Configuration ===

/// UI tick rate in milliseconds.
pub const DEFAULT_TICK_RATE: u64 = 250;
/// Seconds between connection polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
/// Seconds between a dropped connection and the auto-reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;
/// Seconds between the stop and start halves of a manual reconnect.
pub const DEFAULT_RECONNECT_AFTER_DISCONNECT_SECS: u64 = 2;
/// Seconds an auto-reconnect attempt is given before the next one is queued.
pub const DEFAULT_RECONNECT_SETTLE_SECS: u64 = 10;
/// Consecutive unattended reconnect attempts per disconnection episode.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
/// Timeout for read-only status queries (`systemctl is-active`, `ip addr`).
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 5;
/// Timeout for service control and privileged file commands.
pub const DEFAULT_CONTROL_TIMEOUT_SECS: u64 = 10;
/// Timeout for the desktop notification helper.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

// === Connection Test ===

/// Number of checks made after a restart before giving up.
pub const CONNECTION_TEST_ATTEMPTS: u32 = 10;
/// Delay between connection test checks.
pub const CONNECTION_TEST_INTERVAL: Duration = Duration::from_secs(2);

// === Logging ===

/// Maximum number of log entries kept in memory.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 500;
/// Minimum log level shown by default.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Name of the logs subdirectory.
pub const LOGS_DIR_NAME: &str = "logs";
/// Log file size at which the daily file is rotated.
pub const LOG_ROTATION_SIZE: u64 = 5 * 1024 * 1024;
/// Name of the user settings file.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Marker file present while the user has explicitly disconnected.
pub const MANUAL_HOLD_FILE_NAME: &str = "manual-disconnect";

// === Notifications ===

/// Icon passed to `notify-send`.
pub const NOTIFY_ICON: &str = "network-vpn";
pub const NOTIFY_TITLE_CONNECTED: &str = "Kerio VPN Connected";
pub const NOTIFY_TITLE_DISCONNECTED: &str = "Kerio VPN Disconnected";
pub const NOTIFY_TITLE_GENERIC: &str = "Kerio VPN";
pub const NOTIFY_TITLE_ERROR: &str = "Kerio VPN Error";

// === UI Labels ===

pub const LABEL_CONNECTED: &str = "VPN: Connected ✓";
pub const LABEL_DISCONNECTED: &str = "VPN: Disconnected";
pub const LABEL_NOT_CONNECTED: &str = "Not connected";
pub const LABEL_UNKNOWN_SERVER: &str = "Unknown";
pub const LABEL_WAITING_FOR_ADDRESS: &str = "Interface up, waiting for address";
pub const LABEL_RECONNECTING: &str = "Reconnecting VPN...";

// === Messages: CLI Output ===

pub const CLI_MSG_STARTING: &str = "Starting VPN service...";
pub const CLI_MSG_STOPPING: &str = "Stopping VPN service...";
pub const CLI_MSG_RESTARTING: &str = "Restarting VPN service...";
pub const CLI_MSG_CONFIG_SAVED: &str = "Configuration saved successfully";
pub const CLI_MSG_CONFIG_NOT_FOUND: &str =
    "Configuration file not found. Please fill in the settings.";
pub const CLI_MSG_SERVICE_RESTARTED: &str = "VPN service restarted successfully";
pub const CLI_MSG_FETCHING_FINGERPRINT: &str = "Getting server fingerprint from ";
pub const CLI_MSG_NO_FINGERPRINT: &str =
    "Could not get server fingerprint; saving without it (the client will prompt)";
pub const CLI_MSG_ERROR: &str = "Error: ";
