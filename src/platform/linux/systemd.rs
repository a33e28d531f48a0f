//! Kerio service control through `systemctl`.

use super::interface;
use crate::config::AppConfig;
use crate::platform::{ControlError, ServiceAction, VpnBackend};
use crate::state::InterfaceStatus;
use crate::utils;
use std::process::Command;
use std::time::Duration;

/// [`VpnBackend`] for a systemd-managed Kerio client.
///
/// Status queries run unprivileged; start/stop/restart go through `sudo`
/// when configured and not already root.
#[derive(Clone, Debug)]
pub struct SystemdBackend {
    service: String,
    interface: String,
    query_timeout: Duration,
    control_timeout: Duration,
    use_sudo: bool,
}

impl SystemdBackend {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            service: config.service_name.clone(),
            interface: config.interface.clone(),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            control_timeout: Duration::from_secs(config.control_timeout_secs),
            use_sudo: config.use_sudo,
        }
    }
}

impl VpnBackend for SystemdBackend {
    fn service_active(&self) -> bool {
        let mut cmd = Command::new("systemctl");
        cmd.args(["is-active", self.service.as_str()]);

        match utils::run_with_timeout(&mut cmd, self.query_timeout) {
            Ok(output) => output.status.success(),
            Err(e) => {
                crate::log_debug!("SERVICE", "systemctl is-active {}: {e}", self.service);
                false
            }
        }
    }

    fn interface_status(&self) -> InterfaceStatus {
        interface::query(&self.interface, self.query_timeout)
    }

    fn control(&self, action: ServiceAction) -> Result<(), ControlError> {
        let mut cmd = utils::privileged_command("systemctl", self.use_sudo);
        cmd.args([action.verb(), self.service.as_str()]);

        let output = utils::run_with_timeout(&mut cmd, self.control_timeout)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ControlError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_copies_settings() {
        let config = AppConfig {
            service_name: "custom.service".to_string(),
            interface: "kvnet1".to_string(),
            query_timeout_secs: 1,
            control_timeout_secs: 7,
            use_sudo: false,
            ..AppConfig::default()
        };
        let backend = SystemdBackend::from_config(&config);
        assert_eq!(backend.service, "custom.service");
        assert_eq!(backend.interface, "kvnet1");
        assert_eq!(backend.query_timeout, Duration::from_secs(1));
        assert_eq!(backend.control_timeout, Duration::from_secs(7));
        assert!(!backend.use_sudo);
    }

    #[test]
    fn test_unknown_unit_is_inactive() {
        let config = AppConfig {
            service_name: "kvc-indicator-no-such-unit.service".to_string(),
            query_timeout_secs: 2,
            ..AppConfig::default()
        };
        // Missing systemctl, a missing unit and a timeout all read as inactive.
        assert!(!SystemdBackend::from_config(&config).service_active());
    }
}
