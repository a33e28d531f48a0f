//! Main dashboard view.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::time::Instant;

use super::widgets;
use crate::app::App;
use crate::core::monitor::Intent;
use crate::logger::{self, LogLevel};
use crate::theme;
use crate::utils;

/// Width of the `[HH:MM:SS] LEVEL CATEGORY  ` prefix in the activity log.
const LOG_PREFIX_WIDTH: usize = 30;
const LOG_CATEGORY_WIDTH: usize = 8;

/// Render the dashboard view
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Header | Connection | Auto-reconnect | Activity | Footer
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(area);

    render_header(frame, app, chunks[0]);
    render_connection(frame, app, chunks[1]);
    render_policy(frame, app, chunks[2]);
    render_activity_log(frame, chunks[3]);
    widgets::footer::render_dashboard(frame, app, chunks[4]);
}

fn status_color(app: &App) -> Color {
    let state = app.monitor.state();
    if state.connected {
        theme::SUCCESS
    } else if state.is_waiting_for_address() || app.monitor.reconnect_pending() {
        theme::WARNING
    } else {
        theme::ERROR
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {}", app.status_label()),
            Style::default()
                .fg(status_color(app))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" │ ", Style::default().fg(theme::NORD_POLAR_NIGHT_4)),
        Span::styled(&app.server_label, Style::default().fg(theme::TEXT_SECONDARY)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn label(text: &str) -> Span<'_> {
    Span::styled(
        format!("{text:<16}"),
        Style::default().fg(theme::TEXT_SECONDARY),
    )
}

fn flag(on: bool, yes: &'static str, no: &'static str) -> Span<'static> {
    if on {
        Span::styled(yes, Style::default().fg(theme::SUCCESS))
    } else {
        Span::styled(no, Style::default().fg(theme::INACTIVE))
    }
}

fn render_connection(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER_DEFAULT))
        .title(" Connection ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let state = app.monitor.state();
    let intent = match app.monitor.intent() {
        Intent::Idle => "-",
        Intent::Connect => "connect",
        Intent::Disconnect => "disconnect",
    };

    let lines = vec![
        Line::from(Span::styled(
            app.info_line(Instant::now()),
            Style::default().fg(theme::TEXT_PRIMARY),
        )),
        Line::from(vec![
            label("Service"),
            flag(state.service_active, "active", "inactive"),
        ]),
        Line::from(vec![
            label("Interface"),
            flag(state.interface_up, "up", "absent"),
        ]),
        Line::from(vec![
            label("Last request"),
            Span::styled(intent, Style::default().fg(theme::ACCENT_PRIMARY)),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_policy(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER_DEFAULT))
        .title(" Auto-reconnect ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let policy = app.monitor.policy();
    let attempts_style = if policy.is_exhausted() {
        Style::default().fg(theme::ERROR)
    } else {
        Style::default().fg(theme::TEXT_PRIMARY)
    };

    let lines = vec![
        Line::from(vec![label("Enabled"), flag(policy.enabled, "on", "off")]),
        Line::from(vec![
            label("Attempts"),
            Span::styled(
                format!("{}/{}", policy.attempts, policy.max_attempts),
                attempts_style,
            ),
        ]),
        Line::from(vec![
            label("Manual stop"),
            if policy.manual_disconnect {
                Span::styled("yes (suppressed)", Style::default().fg(theme::WARNING))
            } else {
                Span::styled("no", Style::default().fg(theme::INACTIVE))
            },
        ]),
        Line::from(vec![
            label("Queued"),
            flag(app.monitor.reconnect_pending(), "reconnect pending", "-"),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_activity_log(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER_DEFAULT))
        .title(" Event Log ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let all_logs = logger::get_logs();
    if all_logs.is_empty() {
        frame.render_widget(
            Paragraph::new("No activity yet").alignment(Alignment::Center),
            inner,
        );
        return;
    }

    // Newest at the bottom, one entry per line
    let visible_lines = inner.height as usize;
    let start_idx = all_logs.len().saturating_sub(visible_lines);
    let max_msg_len = (inner.width as usize).saturating_sub(LOG_PREFIX_WIDTH);

    let lines: Vec<Line> = all_logs[start_idx..]
        .iter()
        .map(|entry| {
            let time_str = utils::format_system_time_local(entry.timestamp);
            let cat = format!("{:<width$}", entry.category, width = LOG_CATEGORY_WIDTH);

            let message = if entry.message.chars().count() > max_msg_len {
                let cut: String = entry
                    .message
                    .chars()
                    .take(max_msg_len.saturating_sub(1))
                    .collect();
                format!("{cut}…")
            } else {
                entry.message.clone()
            };

            let msg_style = match entry.level {
                LogLevel::Error => Style::default().fg(theme::ERROR),
                LogLevel::Warning => Style::default().fg(theme::WARNING),
                LogLevel::Info if entry.message.starts_with("Connected") => {
                    Style::default().fg(theme::SUCCESS)
                }
                LogLevel::Info => Style::default().fg(theme::INACTIVE),
                LogLevel::Debug => Style::default().fg(Color::DarkGray),
            };

            Line::from(vec![
                Span::styled(
                    format!("[{time_str}] "),
                    Style::default().fg(theme::TEXT_SECONDARY),
                ),
                Span::styled(
                    format!("{} ", entry.level.prefix()),
                    Style::default().fg(entry.level.color()),
                ),
                Span::styled(
                    format!("{cat}  "),
                    Style::default().fg(theme::NORD_FROST_3),
                ),
                Span::styled(message, msg_style),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}
