//! Footer widget with keybinding hints

use crate::app::App;
use crate::message::KEY_HINTS;
use crate::theme;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Render dashboard footer. Reconnect is only offered while connected.
pub fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let connected = app.monitor.state().connected;
    let hints: Vec<(&str, &str)> = KEY_HINTS
        .iter()
        .copied()
        .filter(|(key, _)| connected || *key != "r")
        .collect();
    render_hints(frame, area, &hints);
}

fn render_hints(frame: &mut Frame, area: Rect, hints: &[(&str, &str)]) {
    let chunks = Layout::horizontal([
        Constraint::Min(0),     // Hints (left)
        Constraint::Length(22), // Branding (right)
    ])
    .split(area);

    let mut hint_spans = vec![Span::raw(" ")];
    let mut current_width = 1;
    let max_width = chunks[0].width as usize;

    for (i, (key, action)) in hints.iter().enumerate() {
        // "key" + " " + "action", plus " │ " before all but the first
        let sep_width = if i > 0 { 3 } else { 0 };
        let item_width = key.len() + 1 + action.len() + sep_width;

        if current_width + item_width > max_width {
            break;
        }

        if i > 0 {
            hint_spans.push(Span::styled(
                " │ ",
                Style::default().fg(Color::Rgb(50, 50, 50)),
            ));
        }
        hint_spans.push(Span::styled(
            *key,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
        hint_spans.push(Span::raw(" "));
        hint_spans.push(Span::styled(*action, Style::default().fg(Color::DarkGray)));

        current_width += item_width;
    }
    frame.render_widget(Paragraph::new(Line::from(hint_spans)), chunks[0]);

    let branding = Line::from(vec![Span::styled(
        format!(
            "{} v{} ",
            crate::constants::APP_NAME,
            crate::constants::APP_VERSION
        ),
        Style::default().fg(theme::NORD_POLAR_NIGHT_4),
    )]);
    frame.render_widget(
        Paragraph::new(branding).alignment(Alignment::Right),
        chunks[1],
    );
}
