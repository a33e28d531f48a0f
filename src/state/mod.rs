//! Domain state types for kvc-indicator.
//!
//! - `connection`: observed signals and the derived connection state
//! - `policy`: auto-reconnect budget and manual-override flag
//! - `ui`: toast notifications

mod connection;
mod policy;
mod ui;

pub use connection::{ConnectCriterion, ConnectionState, InterfaceStatus, Observation};
pub use policy::ReconnectPolicy;
pub use ui::{Toast, ToastType};
