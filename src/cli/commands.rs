//! CLI command handlers.

use color_eyre::Result;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::cli::args::{Commands, ConfigAction, ConfigSetArgs};
use crate::config::AppConfig;
use crate::constants;
use crate::core::conn_test::{self, CheckOutcome};
use crate::core::fingerprint;
use crate::core::hold::ManualHold;
use crate::core::kvc_config::{ConfigError, FingerprintSource, KvcConfig, KvcStore};
use crate::core::monitor::{Monitor, MonitorEvent};
use crate::core::notify::{self, DesktopNotifier, Notifier};
use crate::platform::{ServiceAction, SystemdBackend, VpnBackend};
use crate::state::ConnectionState;
use crate::utils;

/// Handles CLI commands that don't run the dashboard.
pub fn handle_command(command: &Commands, config: &AppConfig, config_dir: &Path) -> Result<()> {
    let backend = SystemdBackend::from_config(config);
    let store = KvcStore::from_config(config);
    // Monitors that act on the service share explicit disconnects through
    // the hold file; `status` only observes.
    let monitor = || Monitor::from_config(config).with_hold(ManualHold::in_dir(config_dir));

    match command {
        Commands::Status { json } => handle_status(&backend, &store, config, *json)?,
        Commands::Connect => {
            println!("{}", constants::CLI_MSG_STARTING);
            let events = monitor().connect(&backend);
            exit_on_failure(&events);
        }
        Commands::Disconnect => {
            println!("{}", constants::CLI_MSG_STOPPING);
            let events = monitor().disconnect(&backend);
            exit_on_failure(&events);
        }
        Commands::Reconnect => handle_reconnect(&backend, config, monitor()),
        Commands::Watch => handle_watch(&backend, config, monitor()),
        Commands::Config { action } => match action {
            ConfigAction::Show { reveal } => handle_config_show(&store, *reveal),
            ConfigAction::Set(args) => handle_config_set(&backend, &store, config, args),
            ConfigAction::Test => handle_config_test(&backend, &store),
        },
        Commands::Info => handle_info(config, config_dir, &store),
    }
    Ok(())
}

/// Machine-readable connection state for `status --json`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub ip: Option<String>,
    pub service_active: bool,
    pub interface_up: bool,
    pub service: String,
    pub interface: String,
    pub server: Option<String>,
}

impl StatusReport {
    pub fn new(state: &ConnectionState, config: &AppConfig, server: Option<String>) -> Self {
        Self {
            connected: state.connected,
            ip: state.ip.clone(),
            service_active: state.service_active,
            interface_up: state.interface_up,
            service: config.service_name.clone(),
            interface: config.interface.clone(),
            server,
        }
    }
}

fn handle_status(
    backend: &dyn VpnBackend,
    store: &KvcStore,
    config: &AppConfig,
    json: bool,
) -> Result<()> {
    let mut monitor = Monitor::from_config(config);
    monitor.poll(backend, Instant::now());
    let server = store.load().ok().map(|c| c.server_label());
    let report = StatusReport::new(monitor.state(), config, server);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let label = if report.connected {
        constants::LABEL_CONNECTED
    } else {
        constants::LABEL_DISCONNECTED
    };
    println!("{label}");
    println!(
        "{}",
        crate::app::info_line(
            monitor.state(),
            report
                .server
                .as_deref()
                .unwrap_or(constants::LABEL_UNKNOWN_SERVER),
            None,
        )
    );
    Ok(())
}

fn handle_reconnect(backend: &dyn VpnBackend, config: &AppConfig, mut monitor: Monitor) {
    println!("{}", constants::CLI_MSG_RESTARTING);
    let events = monitor.reconnect(backend, Instant::now());
    exit_on_failure(&events);

    let tick = std::time::Duration::from_millis(config.tick_rate);
    while monitor.pending_tasks() > 0 {
        std::thread::sleep(tick);
        let events = monitor.run_due(backend, Instant::now());
        exit_on_failure(&events);
    }
}

/// Headless monitor loop: polls, runs deferred actions, notifies.
fn handle_watch(backend: &dyn VpnBackend, config: &AppConfig, mut monitor: Monitor) {
    let notifier = DesktopNotifier::new(config.notifications);
    let tick = std::time::Duration::from_millis(config.tick_rate);

    println!(
        "Watching {} on {} (Ctrl-C to stop)",
        config.service_name, config.interface
    );
    loop {
        for event in monitor.tick(backend, Instant::now()) {
            if let Some(notice) = notify::notice_for(&event) {
                println!("[{}] {}", utils::format_local_time(), notice.summary());
                notifier.notify(&notice);
            }
        }
        std::thread::sleep(tick);
    }
}

fn handle_config_show(store: &KvcStore, reveal: bool) {
    let config = match store.load() {
        Ok(config) => config,
        Err(e) => exit_with_config_error(&e),
    };

    let password = if reveal {
        config.password.clone()
    } else {
        utils::mask_secret(&config.password)
    };
    println!("Server:       {}", config.server);
    println!(
        "Port:         {}",
        if config.port.is_empty() {
            constants::DEFAULT_KVC_PORT.to_string()
        } else {
            config.port.clone()
        }
    );
    println!("Username:     {}", config.username);
    println!("Password:     {password}");
    println!("Description:  {}", config.description);
    println!(
        "Autoconnect:  {}",
        if config.autoconnect { "yes" } else { "no" }
    );
    println!(
        "Fingerprint:  {}",
        config.fingerprint.as_deref().unwrap_or("-")
    );
}

/// Apply `config set` flags over the current connection.
pub fn merge_set_args(mut config: KvcConfig, args: &ConfigSetArgs) -> KvcConfig {
    if let Some(server) = &args.server {
        match server.trim().rsplit_once(':') {
            Some((host, port)) if args.port.is_none() => {
                config.server = host.to_string();
                config.port = port.to_string();
            }
            _ => config.server.clone_from(server),
        }
    }
    if let Some(port) = &args.port {
        config.port.clone_from(port);
    }
    if let Some(username) = &args.username {
        config.username.clone_from(username);
    }
    if let Some(password) = &args.password {
        config.password.clone_from(password);
    }
    if let Some(description) = &args.description {
        config.description.clone_from(description);
    }
    if let Some(autoconnect) = args.autoconnect {
        config.autoconnect = autoconnect;
    }
    config
}

fn handle_config_set(
    backend: &dyn VpnBackend,
    store: &KvcStore,
    config: &AppConfig,
    args: &ConfigSetArgs,
) {
    let current = match store.load() {
        Ok(current) => current,
        Err(ConfigError::NotFound(_)) => {
            println!("{}", constants::CLI_MSG_CONFIG_NOT_FOUND);
            KvcConfig::default()
        }
        Err(e) => {
            eprintln!("{}{e}", constants::CLI_MSG_ERROR);
            KvcConfig::default()
        }
    };

    let timeout = config.control_timeout();
    let merged = merge_set_args(current, args);
    let saved = store.save(&merged, |host, port| {
        println!("{}{host}:{port}...", constants::CLI_MSG_FETCHING_FINGERPRINT);
        match fingerprint::fetch(host, port, timeout) {
            Ok(fp) => Some(fp),
            Err(e) => {
                crate::log_warning!("KVC", "Fingerprint lookup failed: {e}");
                None
            }
        }
    });

    match saved {
        Ok((_, source)) => {
            if source == FingerprintSource::Missing {
                println!("{}", constants::CLI_MSG_NO_FINGERPRINT);
            }
            println!("{}", constants::CLI_MSG_CONFIG_SAVED);
        }
        Err(e) => exit_with_config_error(&e),
    }

    if args.restart {
        println!("{}", constants::CLI_MSG_RESTARTING);
        match backend.control(ServiceAction::Restart) {
            Ok(()) => println!("{}", constants::CLI_MSG_SERVICE_RESTARTED),
            Err(e) => {
                eprintln!("{}restarting service: {e}", constants::CLI_MSG_ERROR);
                std::process::exit(1);
            }
        }
    }
}

fn handle_config_test(backend: &dyn VpnBackend, store: &KvcStore) {
    if let Err(e) = store.load().and_then(|c| c.validated()) {
        exit_with_config_error(&e);
    }

    println!("{}", constants::CLI_MSG_RESTARTING);
    let outcome = conn_test::run(
        backend,
        constants::CONNECTION_TEST_ATTEMPTS,
        conn_test::sleep_for(constants::CONNECTION_TEST_INTERVAL),
        |msg| println!("{msg}"),
    );

    match outcome {
        Ok(CheckOutcome::Success(ip)) => {
            println!("✓ Connection successful! VPN IP: {ip}");
        }
        Ok(CheckOutcome::Failed(msg) | CheckOutcome::Continue(msg)) => {
            eprintln!("✗ {msg}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("✗ Failed to restart service: {e}");
            std::process::exit(1);
        }
    }
}

fn handle_info(config: &AppConfig, config_dir: &Path, store: &KvcStore) {
    println!("{} v{}", constants::APP_NAME, constants::APP_VERSION);
    println!();
    println!("Config dir:     {}", config_dir.display());
    println!(
        "Config file:    {}",
        config_dir.join(constants::CONFIG_FILE_NAME).display()
    );
    println!(
        "Logs:           {}",
        config_dir.join(constants::LOGS_DIR_NAME).display()
    );
    println!("Kerio config:   {}", store.path().display());
    let hold = ManualHold::in_dir(config_dir);
    println!(
        "Manual hold:    {} ({})",
        hold.path().display(),
        if hold.is_set() { "set" } else { "clear" }
    );
    println!("Service:        {}", config.service_name);
    println!("Interface:      {}", config.interface);
    println!(
        "Criterion:      {}",
        match config.connect_criterion {
            crate::state::ConnectCriterion::Address => "address",
            crate::state::ConnectCriterion::Interface => "interface",
        }
    );
    println!(
        "Auto-reconnect: {} (max {} attempts)",
        if config.auto_reconnect { "on" } else { "off" },
        config.max_reconnect_attempts
    );
    println!(
        "Privileges:     {}",
        if utils::is_root() {
            "root"
        } else if config.use_sudo {
            "sudo"
        } else {
            "none"
        }
    );
}

/// Print the first failed action and exit 1.
fn exit_on_failure(events: &[MonitorEvent]) {
    for event in events {
        if let MonitorEvent::ActionFailed { action, error } = event {
            eprintln!("{}systemctl {action}: {error}", constants::CLI_MSG_ERROR);
            std::process::exit(1);
        }
    }
}

fn exit_with_config_error(e: &ConfigError) -> ! {
    match e {
        ConfigError::NotFound(_) => eprintln!("{}", constants::CLI_MSG_CONFIG_NOT_FOUND),
        other => eprintln!("{}{other}", constants::CLI_MSG_ERROR),
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing() -> KvcConfig {
        KvcConfig {
            server: "old.example.com".to_string(),
            port: "4090".to_string(),
            username: "jdoe".to_string(),
            password: "secret".to_string(),
            fingerprint: Some("AB:CD".to_string()),
            ..KvcConfig::default()
        }
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let args = ConfigSetArgs {
            username: Some("alice".to_string()),
            ..ConfigSetArgs::default()
        };
        let merged = merge_set_args(existing(), &args);
        assert_eq!(merged.username, "alice");
        assert_eq!(merged.server, "old.example.com");
        assert_eq!(merged.password, "secret");
        assert_eq!(merged.fingerprint.as_deref(), Some("AB:CD"));
    }

    #[test]
    fn test_merge_splits_server_port() {
        let args = ConfigSetArgs {
            server: Some("new.example.com:5000".to_string()),
            ..ConfigSetArgs::default()
        };
        let merged = merge_set_args(existing(), &args);
        assert_eq!(merged.server, "new.example.com");
        assert_eq!(merged.port, "5000");
    }

    #[test]
    fn test_merge_explicit_port_wins() {
        let args = ConfigSetArgs {
            server: Some("new.example.com".to_string()),
            port: Some("6000".to_string()),
            autoconnect: Some(true),
            ..ConfigSetArgs::default()
        };
        let merged = merge_set_args(existing(), &args);
        assert_eq!(merged.server, "new.example.com");
        assert_eq!(merged.port, "6000");
        assert!(merged.autoconnect);
    }

    #[test]
    fn test_status_report_json() {
        let state = ConnectionState {
            connected: true,
            ip: Some("10.0.0.5".to_string()),
            service_active: true,
            interface_up: true,
            since: None,
        };
        let report = StatusReport::new(
            &state,
            &AppConfig::default(),
            Some("vpn.example.com:4090".to_string()),
        );
        let value: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["connected"], true);
        assert_eq!(value["ip"], "10.0.0.5");
        assert_eq!(value["service"], "kerio-kvc.service");
        assert_eq!(value["interface"], "kvnet");
        assert_eq!(value["server"], "vpn.example.com:4090");
    }
}
