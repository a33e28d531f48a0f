//! Overlays drawn on top of the dashboard.

pub mod toast;
