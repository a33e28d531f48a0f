//! # kvc-indicator
//!
//! Terminal dashboard and CLI for the Kerio Control VPN client on Linux.
//! It watches the client's systemd service and tunnel interface, reconnects
//! dropped tunnels, and edits the client's persistent connection.
//!
//! ## Modules
//! - [`app`]: Dashboard state and logic.
//! - [`cli`]: Command-line argument parsing and one-shot commands.
//! - [`config`]: User settings (`config.toml`).
//! - [`core`]: Connection monitor and Kerio configuration handling.
//! - [`event`]: Event loop handling.
//! - [`platform`]: systemd and interface queries.
//! - [`ui`]: TUI rendering.

mod app;
mod cli;
mod config;
mod constants;
mod core;
mod event;
mod logger;
mod message;
mod platform;
mod state;
mod theme;
mod ui;
mod utils;

use app::App;
use clap::Parser;
use cli::args::Args;
use color_eyre::Result;
use event::{Event, EventHandler};

use crate::core::hold::ManualHold;
use crate::core::kvc_config::KvcStore;
use crate::core::notify::DesktopNotifier;
use crate::platform::SystemdBackend;

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let config_dir = config::resolve_config_dir(args.config_dir.as_ref())
        .map_err(|e| color_eyre::eyre::eyre!("Failed to resolve config directory: {e}"))?;

    // Load config.toml (or use defaults)
    let app_config = match config::load_config(&config_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("Fix the file or remove it to use defaults:");
            eprintln!(
                "  nano {}/{}",
                config_dir.display(),
                constants::CONFIG_FILE_NAME
            );
            eprintln!(
                "  rm {}/{}",
                config_dir.display(),
                constants::CONFIG_FILE_NAME
            );
            std::process::exit(1);
        }
    };

    logger::configure(
        &app_config.log_level,
        app_config.max_log_entries,
        Some(config_dir.join(constants::LOGS_DIR_NAME)),
    );

    if let Some(command) = &args.command {
        return cli::commands::handle_command(command, &app_config, &config_dir);
    }

    let terminal = ratatui::init();
    let result = run_tui(terminal, &app_config, &config_dir);
    ratatui::restore();

    result
}

/// Runs the main TUI event loop.
fn run_tui(
    mut terminal: ratatui::DefaultTerminal,
    config: &config::AppConfig,
    config_dir: &std::path::Path,
) -> Result<()> {
    let server_label = KvcStore::from_config(config)
        .load()
        .ok()
        .map(|c| c.server_label());
    let mut app = App::new(
        config,
        Box::new(SystemdBackend::from_config(config)),
        Box::new(DesktopNotifier::new(config.notifications)),
        server_label,
    )
    .with_hold(ManualHold::in_dir(config_dir));
    let events = EventHandler::new(config.tick_rate);

    // First poll before the first frame so the state isn't blank
    app.on_tick();
    terminal.draw(|frame| ui::render(frame, &app))?;

    while !app.should_quit {
        match events.next()? {
            Event::Key(key_event) => app.handle_key(key_event),
            Event::Tick => app.on_tick(),
            Event::Resize(width, height) => app.on_resize(width, height),
        }
        terminal.draw(|frame| ui::render(frame, &app))?;
    }

    Ok(())
}
