//! Message system for the dashboard.
//!
//! All state changes in [`App`](crate::app::App) flow through this enum
//! (The Elm Architecture): keys map to messages, messages update state.

use crate::state::ToastType;

/// Everything that can change dashboard state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // === Connection ===
    /// Connect when disconnected, disconnect when connected
    ToggleConnect,
    /// Stop, then start again (only while connected)
    Reconnect,
    /// Flip the auto-reconnect toggle
    ToggleAutoReconnect,

    // === UI ===
    /// Show toast notification
    Toast(String, ToastType),
    /// Dismiss the current toast
    DismissToast,

    // === System ===
    /// Periodic heartbeat tick
    Tick,
    /// Terminal resize event
    Resize(u16, u16),
    /// Quit the application
    Quit,
}

/// Key hints shown in the footer, in display order.
pub const KEY_HINTS: &[(&str, &str)] = &[
    ("c", "Connect/Disconnect"),
    ("r", "Reconnect"),
    ("a", "Auto-reconnect"),
    ("q", "Quit"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_cover_every_key_action() {
        let keys: Vec<_> = KEY_HINTS.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["c", "r", "a", "q"]);
    }
}
