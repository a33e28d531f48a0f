//! Platform abstraction layer for the Kerio client's system collaborators.
//!
//! The monitor never runs commands itself: it talks to a [`VpnBackend`],
//! which on Linux is implemented with `systemctl` and `ip addr`. Tests swap
//! in fakes implementing the same trait.

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
compile_error!("kvc-indicator only supports Linux (the Kerio client ships as a systemd unit)");

use crate::state::{InterfaceStatus, Observation};
use crate::utils::RunError;

#[cfg(target_os = "linux")]
pub use linux::SystemdBackend;

/// Errors from service control commands.
#[derive(Debug)]
pub enum ControlError {
    /// The command could not be run or timed out.
    Run(RunError),
    /// The command ran and exited unsuccessfully.
    Failed {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Trimmed stderr of the command.
        stderr: String,
    },
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(e) => write!(f, "{e}"),
            Self::Failed { code, stderr } => {
                match code {
                    Some(c) => write!(f, "exit status {c}")?,
                    None => write!(f, "terminated by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ControlError {}

impl From<RunError> for ControlError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

/// Service control verbs issued on behalf of the user or the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    /// `systemctl` verb for this action.
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// Access to the VPN daemon and its network interface.
///
/// Queries never fail: an error or timeout is reported as the negative
/// signal (inactive service, absent interface). Control commands report
/// their failure so it can be shown to the user.
pub trait VpnBackend {
    /// Whether the VPN service is active.
    fn service_active(&self) -> bool;

    /// Status of the VPN interface.
    fn interface_status(&self) -> InterfaceStatus;

    /// Issue a service control command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not run or exited unsuccessfully.
    fn control(&self, action: ServiceAction) -> Result<(), ControlError>;

    /// Gather both signals for one poll cycle.
    ///
    /// The interface is only queried when the service is active.
    fn observe(&self) -> Observation {
        let service_active = self.service_active();
        let interface = if service_active {
            self.interface_status()
        } else {
            InterfaceStatus::Absent
        };
        Observation {
            service_active,
            interface,
        }
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted backend for tests.

    use super::{ControlError, ServiceAction, VpnBackend};
    use crate::state::InterfaceStatus;
    use std::cell::RefCell;

    /// Backend whose signals are set by the test and which records every
    /// control command it receives.
    #[derive(Default)]
    pub struct FakeBackend {
        pub service_active: RefCell<bool>,
        pub interface: RefCell<InterfaceStatus>,
        pub fail_control: RefCell<bool>,
        pub actions: RefCell<Vec<ServiceAction>>,
        pub interface_queries: RefCell<u32>,
    }

    impl FakeBackend {
        pub fn connected(ip: &str) -> Self {
            let backend = Self::default();
            backend.set_connected(ip);
            backend
        }

        pub fn set_connected(&self, ip: &str) {
            *self.service_active.borrow_mut() = true;
            *self.interface.borrow_mut() = InterfaceStatus::Up {
                ipv4: Some(ip.to_string()),
            };
        }

        pub fn set_down(&self) {
            *self.service_active.borrow_mut() = false;
            *self.interface.borrow_mut() = InterfaceStatus::Absent;
        }

        pub fn actions(&self) -> Vec<ServiceAction> {
            self.actions.borrow().clone()
        }

        pub fn count(&self, action: ServiceAction) -> usize {
            self.actions.borrow().iter().filter(|a| **a == action).count()
        }
    }

    impl VpnBackend for FakeBackend {
        fn service_active(&self) -> bool {
            *self.service_active.borrow()
        }

        fn interface_status(&self) -> InterfaceStatus {
            *self.interface_queries.borrow_mut() += 1;
            self.interface.borrow().clone()
        }

        fn control(&self, action: ServiceAction) -> Result<(), ControlError> {
            self.actions.borrow_mut().push(action);
            if *self.fail_control.borrow() {
                return Err(ControlError::Failed {
                    code: Some(1),
                    stderr: "sudo: a password is required".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeBackend;
    use super::*;

    #[test]
    fn test_observe_skips_interface_when_service_inactive() {
        let backend = FakeBackend::default();
        *backend.interface.borrow_mut() = InterfaceStatus::Up {
            ipv4: Some("10.0.0.5".to_string()),
        };
        let obs = backend.observe();
        assert!(!obs.service_active);
        assert_eq!(obs.interface, InterfaceStatus::Absent);
        assert_eq!(*backend.interface_queries.borrow(), 0);
    }

    #[test]
    fn test_observe_reads_interface_when_active() {
        let backend = FakeBackend::connected("10.0.0.5");
        let obs = backend.observe();
        assert!(obs.service_active);
        assert_eq!(obs.interface.ipv4(), Some("10.0.0.5"));
    }

    #[test]
    fn test_control_error_display() {
        let err = ControlError::Failed {
            code: Some(5),
            stderr: "Unit not found".to_string(),
        };
        assert_eq!(err.to_string(), "exit status 5: Unit not found");
        let err = ControlError::Failed {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "terminated by signal");
    }
}
