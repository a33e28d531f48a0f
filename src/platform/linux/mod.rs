//! Linux platform implementations.
//!
//! Uses `systemctl` for the Kerio service and `ip addr` for the tunnel
//! interface.

pub mod interface;
pub mod systemd;

pub use systemd::SystemdBackend;
