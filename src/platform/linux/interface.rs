//! Linux VPN interface detection via `ip addr`.

use crate::state::InterfaceStatus;
use crate::utils;
use std::net::Ipv4Addr;
use std::process::Command;
use std::time::Duration;

/// Query `ip addr show <interface>`.
///
/// A non-zero exit (no such device), a missing `ip` binary, or a timeout all
/// read as [`InterfaceStatus::Absent`].
pub fn query(interface: &str, timeout: Duration) -> InterfaceStatus {
    let mut cmd = Command::new("ip");
    cmd.args(["addr", "show", interface]);

    match utils::run_with_timeout(&mut cmd, timeout) {
        Ok(output) if output.status.success() => InterfaceStatus::Up {
            ipv4: parse_first_ipv4(&String::from_utf8_lossy(&output.stdout)),
        },
        Ok(_) => InterfaceStatus::Absent,
        Err(e) => {
            crate::log_debug!("IFACE", "ip addr show {interface}: {e}");
            InterfaceStatus::Absent
        }
    }
}

/// Extract the first IPv4 address from `ip addr` output.
///
/// IPv4 lines look like `    inet 10.0.0.2/32 scope global kvnet`; `inet6`
/// lines are skipped and the CIDR suffix is stripped.
pub fn parse_first_ipv4(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        if parts.next()? != "inet" {
            return None;
        }
        let addr = parts.next()?.split('/').next()?;
        addr.parse::<Ipv4Addr>().ok().map(|ip| ip.to_string())
    })
}
