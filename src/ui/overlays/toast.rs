//! Toast notification overlay

use crate::app::App;
use crate::state::ToastType;
use crate::theme;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Render toast notification, centered over the dashboard
pub fn render(frame: &mut Frame, app: &App) {
    let Some(toast) = &app.toast else {
        return;
    };
    let area = frame.area();
    let width = (area.width / 3).clamp(30, 60).min(area.width);

    // Height follows the wrapped text plus padding
    let inner_width = usize::from(width.saturating_sub(4));
    let text_len = toast.message.chars().count();
    let text_lines = if inner_width > 0 {
        u16::try_from(text_len.div_ceil(inner_width)).unwrap_or(u16::MAX)
    } else {
        1
    };
    let height = text_lines.saturating_add(4).max(7).min(area.height);

    let toast_area = Rect {
        x: (area.width / 2).saturating_sub(width / 2),
        y: (area.height / 2).saturating_sub(height / 2),
        width,
        height,
    };

    frame.render_widget(Clear, toast_area);

    let (title, color) = match toast.toast_type {
        ToastType::Info => (" INFO ", theme::NORD_FROST_2),
        ToastType::Success => (" SUCCESS ", theme::NORD_GREEN),
        ToastType::Warning => (" WARNING ", theme::NORD_YELLOW),
        ToastType::Error => (" ERROR ", theme::NORD_RED),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Black)
                .bg(color)
                .add_modifier(Modifier::BOLD),
        ));

    let inner_area = block.inner(toast_area);
    frame.render_widget(block, toast_area);

    let vertical_chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(text_lines),
        Constraint::Fill(1),
    ])
    .split(inner_area);

    let paragraph = Paragraph::new(toast.message.as_str())
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, vertical_chunks[1]);
}
