//! Connection monitoring and Kerio client configuration.
//!
//! - `monitor`: reconciliation loop and auto-reconnect policy
//! - `scheduler`: delayed actions run from the poll loop
//! - `hold`: manual-disconnect marker shared with other processes
//! - `kvc_config`: reading and writing the client's XML configuration
//! - `fingerprint`: server certificate fingerprint lookup
//! - `conn_test`: restart-and-verify connection test
//! - `notify`: desktop notifications for monitor events

pub mod fingerprint;
pub mod hold;
pub mod kvc_config;
pub mod monitor;
pub mod notify;
pub mod scheduler;
