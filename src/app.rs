//! Dashboard application state and logic.
//!
//! [`App`] wraps the connection [`Monitor`] with everything the terminal
//! dashboard needs: the backend it drives, where notifications go, the
//! server label and the current toast.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;

use crate::config::AppConfig;
use crate::constants;
use crate::core::hold::ManualHold;
use crate::core::monitor::{Monitor, MonitorEvent};
use crate::core::notify::{self, Notifier};
use crate::message::Message;
use crate::platform::VpnBackend;
use crate::state::{ConnectionState, Toast, ToastType};
use crate::utils;

/// Main application state container.
pub struct App {
    /// Flag indicating the application should exit.
    pub should_quit: bool,
    /// Connection state, reconnect policy and deferred actions.
    pub monitor: Monitor,
    /// `server:port` from the Kerio config, or "Unknown".
    pub server_label: String,
    pub toast: Option<Toast>,
    pub terminal_size: (u16, u16),

    backend: Box<dyn VpnBackend>,
    notifier: Box<dyn Notifier>,
}

impl App {
    pub fn new(
        config: &AppConfig,
        backend: Box<dyn VpnBackend>,
        notifier: Box<dyn Notifier>,
        server_label: Option<String>,
    ) -> Self {
        crate::log_info!(
            "INIT",
            "{} v{} starting",
            constants::APP_NAME,
            constants::APP_VERSION
        );
        Self {
            should_quit: false,
            monitor: Monitor::from_config(config),
            server_label: server_label
                .unwrap_or_else(|| constants::LABEL_UNKNOWN_SERVER.to_string()),
            toast: None,
            terminal_size: (0, 0),
            backend,
            notifier,
        }
    }

    /// Share explicit disconnects with CLI commands and other monitors.
    #[must_use]
    pub fn with_hold(mut self, hold: ManualHold) -> Self {
        self.monitor = self.monitor.with_hold(hold);
        self
    }

    /// Map a key press to a message and handle it.
    pub fn handle_key(&mut self, key: KeyEvent) {
        // Quit always takes priority
        if (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
            || key.code == KeyCode::Char('q')
        {
            self.handle_message(Message::Quit);
            return;
        }

        // Esc dismisses a toast first, quits otherwise
        if key.code == KeyCode::Esc {
            if self.toast.is_some() {
                self.handle_message(Message::DismissToast);
            } else {
                self.handle_message(Message::Quit);
            }
            return;
        }

        match key.code {
            KeyCode::Char('c') => self.handle_message(Message::ToggleConnect),
            KeyCode::Char('r') => self.handle_message(Message::Reconnect),
            KeyCode::Char('a') => self.handle_message(Message::ToggleAutoReconnect),
            _ => {}
        }
    }

    pub fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::ToggleConnect => {
                let events = self.monitor.toggle(self.backend.as_ref());
                self.present(events);
            }
            Message::Reconnect => {
                if self.monitor.state().connected {
                    let events = self
                        .monitor
                        .reconnect(self.backend.as_ref(), Instant::now());
                    self.show_toast(constants::LABEL_RECONNECTING.to_string(), ToastType::Info);
                    self.present(events);
                } else {
                    self.show_toast("Not connected".to_string(), ToastType::Warning);
                }
            }
            Message::ToggleAutoReconnect => {
                let enabled = !self.monitor.policy().enabled;
                self.monitor.set_auto_reconnect(enabled);
                let label = if enabled { "enabled" } else { "disabled" };
                self.show_toast(format!("Auto-reconnect {label}"), ToastType::Info);
            }
            Message::Toast(message, toast_type) => self.show_toast(message, toast_type),
            Message::DismissToast => self.toast = None,
            Message::Tick => {
                let events = self.monitor.tick(self.backend.as_ref(), Instant::now());
                self.present(events);
                if self.toast.as_ref().is_some_and(Toast::is_expired) {
                    self.toast = None;
                }
            }
            Message::Resize(w, h) => self.terminal_size = (w, h),
            Message::Quit => self.should_quit = true,
        }
    }

    /// Periodic tick from the event loop.
    pub fn on_tick(&mut self) {
        self.handle_message(Message::Tick);
    }

    pub fn on_resize(&mut self, width: u16, height: u16) {
        self.handle_message(Message::Resize(width, height));
    }

    /// Status line text for the current state.
    pub fn status_label(&self) -> &'static str {
        if self.monitor.state().connected {
            constants::LABEL_CONNECTED
        } else {
            constants::LABEL_DISCONNECTED
        }
    }

    /// `IP: .. | Server: .. | Duration: ..` while connected.
    pub fn info_line(&self, now: Instant) -> String {
        info_line(
            self.monitor.state(),
            &self.server_label,
            self.monitor.uptime(now),
        )
    }

    fn present(&mut self, events: Vec<MonitorEvent>) {
        for event in events {
            if let Some(notice) = notify::notice_for(&event) {
                self.notifier.notify(&notice);
                self.handle_message(Message::Toast(notice.summary(), notice.kind));
            }
        }
    }

    fn show_toast(&mut self, message: String, toast_type: ToastType) {
        self.toast = Some(Toast::new(message, toast_type));
    }
}

/// Connection info line.
pub fn info_line(
    state: &ConnectionState,
    server: &str,
    uptime: Option<std::time::Duration>,
) -> String {
    if !state.connected {
        return if state.is_waiting_for_address() {
            constants::LABEL_WAITING_FOR_ADDRESS.to_string()
        } else {
            constants::LABEL_NOT_CONNECTED.to_string()
        };
    }

    let mut parts = Vec::new();
    if let Some(ip) = &state.ip {
        parts.push(format!("IP: {ip}"));
    }
    if !server.is_empty() {
        parts.push(format!("Server: {server}"));
    }
    if let Some(uptime) = uptime {
        parts.push(format!("Duration: {}", utils::format_duration(uptime)));
    }

    if parts.is_empty() {
        "Connected".to_string()
    } else {
        parts.join(" | ")
    }
}
