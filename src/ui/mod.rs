//! UI rendering module

mod dashboard;
mod overlays;
mod widgets;

use crate::app::App;
use ratatui::Frame;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    dashboard::render(frame, app);

    // Render toast notification if present
    if app.toast.is_some() {
        overlays::toast::render(frame, app);
    }
}
