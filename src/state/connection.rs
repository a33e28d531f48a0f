//! VPN connection state types.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What the VPN interface query reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InterfaceStatus {
    /// Interface missing, or the query failed or timed out.
    #[default]
    Absent,
    /// Interface exists; `ipv4` is the first address assigned to it, if any.
    Up { ipv4: Option<String> },
}

impl InterfaceStatus {
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self, Self::Up { .. })
    }

    #[must_use]
    pub fn ipv4(&self) -> Option<&str> {
        match self {
            Self::Up { ipv4 } => ipv4.as_deref(),
            Self::Absent => None,
        }
    }
}

/// Raw signals gathered in one poll cycle.
///
/// Both signals come from the same cycle; a failed query is already folded
/// into a negative value by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// `systemctl is-active` succeeded.
    pub service_active: bool,
    /// Interface status (always `Absent` when the service is inactive).
    pub interface: InterfaceStatus,
}

/// Which interface condition counts as "connected".
///
/// `Address` requires an IPv4 address on the interface; `Interface` accepts
/// the interface merely existing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectCriterion {
    #[default]
    Address,
    Interface,
}

/// Connection state derived from one [`Observation`].
///
/// Never stored on its own: the monitor recomputes it every cycle and only
/// carries `since` across cycles while the connection stays up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Service active and the interface criterion met.
    pub connected: bool,
    /// Address assigned to the VPN interface.
    pub ip: Option<String>,
    /// When the current connection was first observed.
    pub since: Option<Instant>,
    /// Service reported active this cycle.
    pub service_active: bool,
    /// Interface present this cycle (may still lack an address).
    pub interface_up: bool,
}

impl ConnectionState {
    /// Derive the state for this cycle.
    ///
    /// `since` is the start time carried over from the previous cycle; it is
    /// kept only while connected.
    #[must_use]
    pub fn derive(obs: &Observation, criterion: ConnectCriterion, since: Option<Instant>) -> Self {
        let interface_ok = match criterion {
            ConnectCriterion::Address => obs.interface.ipv4().is_some(),
            ConnectCriterion::Interface => obs.interface.is_up(),
        };
        let connected = obs.service_active && interface_ok;

        Self {
            connected,
            ip: obs.interface.ipv4().map(str::to_string),
            since: if connected { since } else { None },
            service_active: obs.service_active,
            interface_up: obs.interface.is_up(),
        }
    }

    /// Interface is up but the stricter address criterion is not yet met.
    #[must_use]
    pub const fn is_waiting_for_address(&self) -> bool {
        !self.connected && self.service_active && self.interface_up && self.ip.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(service_active: bool, interface: InterfaceStatus) -> Observation {
        Observation {
            service_active,
            interface,
        }
    }

    fn up(ip: Option<&str>) -> InterfaceStatus {
        InterfaceStatus::Up {
            ipv4: ip.map(str::to_string),
        }
    }

    #[test]
    fn test_all_signals_negative_is_disconnected() {
        let state = ConnectionState::derive(
            &obs(false, InterfaceStatus::Absent),
            ConnectCriterion::Interface,
            Some(Instant::now()),
        );
        assert!(!state.connected);
        assert_eq!(state.since, None);
        assert_eq!(state.ip, None);
    }

    #[test]
    fn test_service_and_address_is_connected() {
        let state = ConnectionState::derive(
            &obs(true, up(Some("10.0.0.5"))),
            ConnectCriterion::Address,
            None,
        );
        assert!(state.connected);
        assert_eq!(state.ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_interface_without_address_depends_on_criterion() {
        let o = obs(true, up(None));

        let strict = ConnectionState::derive(&o, ConnectCriterion::Address, None);
        assert!(!strict.connected);
        assert!(strict.is_waiting_for_address());

        let loose = ConnectionState::derive(&o, ConnectCriterion::Interface, None);
        assert!(loose.connected);
        assert!(!loose.is_waiting_for_address());
    }

    #[test]
    fn test_interface_up_but_service_inactive() {
        let state = ConnectionState::derive(
            &obs(false, up(Some("10.0.0.5"))),
            ConnectCriterion::Interface,
            None,
        );
        assert!(!state.connected);
    }

    #[test]
    fn test_criterion_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            criterion: ConnectCriterion,
        }
        let w: Wrapper = toml::from_str("criterion = \"interface\"").unwrap();
        assert_eq!(w.criterion, ConnectCriterion::Interface);
    }
}
