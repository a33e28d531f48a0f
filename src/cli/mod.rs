//! Command-line interface module.
//!
//! Provides argument parsing and the one-shot commands that run without
//! the dashboard.

pub mod args;
pub mod commands;
