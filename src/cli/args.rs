//! Command-line argument definitions.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// kvc-indicator - Kerio Control VPN client monitor and config editor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory for config.toml and logs
    #[arg(long, global = true, env = "KVC_INDICATOR_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Subcommand to execute (runs the dashboard when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the current connection state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the VPN service
    Connect,
    /// Stop the VPN service
    Disconnect,
    /// Stop the VPN service, then start it again
    Reconnect,
    /// Monitor the connection without the dashboard (notifications + log)
    Watch,
    /// Show or edit the Kerio client configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show paths and settings in use
    Info,
}

/// `config` subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the persistent connection
    Show {
        /// Print the password instead of masking it
        #[arg(long)]
        reveal: bool,
    },
    /// Change fields of the persistent connection and save
    Set(ConfigSetArgs),
    /// Restart the service and check that the tunnel comes up
    Test,
}

/// Fields for `config set`; omitted fields keep their current value.
#[derive(ClapArgs, Debug, Default)]
pub struct ConfigSetArgs {
    /// Server host name or address (may include `:port`)
    #[arg(long)]
    pub server: Option<String>,
    /// Server port (default 4090)
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Connect automatically when the client starts
    #[arg(long)]
    pub autoconnect: Option<bool>,
    /// Restart the VPN service after saving
    #[arg(long)]
    pub restart: bool,
}
