//! Desktop notifications for monitor events.

use std::process::Command;

use crate::constants;
use crate::core::monitor::MonitorEvent;
use crate::state::ToastType;
use crate::utils;

/// A message for the user, shown as a toast and sent to the desktop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub body: String,
    pub kind: ToastType,
}

impl Notice {
    fn new(title: &'static str, body: impl Into<String>, kind: ToastType) -> Self {
        Self {
            title,
            body: body.into(),
            kind,
        }
    }

    /// Single-line form for toasts and the terminal.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.title, self.body.replace('\n', " "))
    }
}

/// Map a monitor event to what the user is told about it.
///
/// Routine events (issued commands, queued attempts) return `None`; the log
/// already records them.
pub fn notice_for(event: &MonitorEvent) -> Option<Notice> {
    match event {
        MonitorEvent::Connected { ip } => Some(Notice::new(
            constants::NOTIFY_TITLE_CONNECTED,
            format!(
                "VPN connection established\nIP: {}",
                ip.as_deref().unwrap_or("unknown")
            ),
            ToastType::Success,
        )),
        MonitorEvent::Disconnected => Some(Notice::new(
            constants::NOTIFY_TITLE_DISCONNECTED,
            "VPN connection lost",
            ToastType::Warning,
        )),
        MonitorEvent::AutoReconnecting { attempt, max } => Some(Notice::new(
            constants::NOTIFY_TITLE_GENERIC,
            format!("Auto-reconnecting... (attempt {attempt}/{max})"),
            ToastType::Info,
        )),
        MonitorEvent::ReconnectExhausted { max } => Some(Notice::new(
            constants::NOTIFY_TITLE_GENERIC,
            format!("Auto-reconnect gave up after {max} attempts"),
            ToastType::Error,
        )),
        MonitorEvent::ActionFailed { action, error } => Some(Notice::new(
            constants::NOTIFY_TITLE_ERROR,
            format!("Failed to {} VPN: {error}", action.verb()),
            ToastType::Error,
        )),
        MonitorEvent::ReconnectScheduled { .. }
        | MonitorEvent::ReconnectCancelled { .. }
        | MonitorEvent::ReconnectSkipped { .. }
        | MonitorEvent::ConnectCancelled
        | MonitorEvent::ActionIssued(_) => None,
    }
}

/// Where notices go besides the UI.
pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

/// Sends notices with `notify-send`. Failures are logged and otherwise ignored.
#[derive(Clone, Debug)]
pub struct DesktopNotifier {
    enabled: bool,
}

impl DesktopNotifier {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notice: &Notice) {
        if !self.enabled {
            return;
        }
        let mut cmd = Command::new("notify-send");
        cmd.args(["-i", constants::NOTIFY_ICON, notice.title, notice.body.as_str()]);
        match utils::run_with_timeout(&mut cmd, constants::NOTIFY_TIMEOUT) {
            Ok(output) if output.status.success() => {}
            Ok(output) => crate::log_debug!(
                "NOTIFY",
                "notify-send exited with {}",
                output.status
            ),
            Err(e) => crate::log_debug!("NOTIFY", "notify-send: {e}"),
        }
    }
}

#[cfg(test)]
pub mod recording {
    //! Notifier that keeps what it was given.

    use super::{Notice, Notifier};
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: RefCell<Vec<Notice>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: &Notice) {
            self.sent.borrow_mut().push(notice.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ServiceAction;

    #[test]
    fn test_connected_notice_carries_ip() {
        let notice = notice_for(&MonitorEvent::Connected {
            ip: Some("10.0.0.5".to_string()),
        })
        .unwrap();
        assert_eq!(notice.title, "Kerio VPN Connected");
        assert!(notice.body.contains("IP: 10.0.0.5"));
        assert_eq!(notice.kind, ToastType::Success);
        assert_eq!(
            notice.summary(),
            "Kerio VPN Connected: VPN connection established IP: 10.0.0.5"
        );
    }

    #[test]
    fn test_auto_reconnect_notice() {
        let notice = notice_for(&MonitorEvent::AutoReconnecting { attempt: 2, max: 3 }).unwrap();
        assert_eq!(notice.body, "Auto-reconnecting... (attempt 2/3)");
    }

    #[test]
    fn test_failed_action_notice() {
        let notice = notice_for(&MonitorEvent::ActionFailed {
            action: ServiceAction::Stop,
            error: "exit status 1".to_string(),
        })
        .unwrap();
        assert_eq!(notice.title, "Kerio VPN Error");
        assert_eq!(notice.body, "Failed to stop VPN: exit status 1");
    }

    #[test]
    fn test_routine_events_are_silent() {
        assert!(notice_for(&MonitorEvent::ActionIssued(ServiceAction::Start)).is_none());
        assert!(notice_for(&MonitorEvent::ReconnectScheduled { attempt: 1, max: 3 }).is_none());
        assert!(notice_for(&MonitorEvent::ReconnectCancelled { attempt: 1 }).is_none());
        assert!(notice_for(&MonitorEvent::ReconnectSkipped { attempt: 1 }).is_none());
        assert!(notice_for(&MonitorEvent::ConnectCancelled).is_none());
    }

    #[test]
    fn test_disabled_notifier_does_nothing() {
        // Must not spawn anything; there is nothing to observe beyond not panicking.
        DesktopNotifier::new(false).notify(&Notice::new("t", "b", ToastType::Info));
    }
}
