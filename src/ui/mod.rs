//! UI rendering for bulkup

pub mod widgets;

use std::time::Duration;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    symbols,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::notify::Level;
use crate::theme::ThemeColors;
use crate::upload::session::Control;
use crate::upload::WorkflowState;

use widgets::file_item::FileItem;
use widgets::progress::{format_amount, format_bytes, format_position, ratio};

const TOAST_TTL: Duration = Duration::from_secs(6);

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
    let theme = app.theme.colors();
    let size = frame.area();

    frame.render_widget(Block::default().style(theme.background()), size);

    let show_progress = matches!(
        app.session.state(),
        WorkflowState::Uploading | WorkflowState::Completed { .. }
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),                                  // Header
            Constraint::Min(3),                                     // File list
            Constraint::Length(if show_progress { 4 } else { 0 }), // Progress
            Constraint::Length(1),                                  // Toast
            Constraint::Length(1),                                  // Footer
        ])
        .split(size);

    draw_header(frame, app, theme, chunks[0]);
    draw_files(frame, app, theme, chunks[1]);
    if show_progress {
        draw_progress(frame, app, theme, chunks[2]);
    }
    draw_toast(frame, app, theme, chunks[3]);
    draw_footer(frame, app, theme, chunks[4]);

    if let WorkflowState::Error {
        message,
        stacktrace,
    } = app.session.state()
    {
        draw_error_popup(frame, theme, message, stacktrace, app.show_details, size);
    }

    if let Some(ref input) = app.path_input {
        draw_path_popup(frame, theme, input, size);
    }
}

fn draw_header(frame: &mut Frame, app: &App, theme: &ThemeColors, area: Rect) {
    let time = chrono::Local::now().format("%H:%M").to_string();
    let state = app.session.state();

    let state_style = match state {
        WorkflowState::Error { .. } => theme.error(),
        WorkflowState::Completed { .. } => theme.success(),
        WorkflowState::Overwrite { .. } | WorkflowState::ActiveConflict => theme.warning(),
        WorkflowState::Checking | WorkflowState::Uploading => theme.info(),
        _ => theme.text_muted(),
    };

    let target = format!("→ {}", app.session.target_folder());
    let state_text = format!("[{}]", state.label());
    let transport = format!(" via {}", app.session.strategy_name());
    let content_len =
        9 + target.chars().count() + 2 + state_text.len() + transport.len() + time.len() + 2;
    let padding = area.width.saturating_sub(content_len as u16) as usize;

    let header = Line::from(vec![
        Span::styled("  bulkup  ", theme.title()),
        Span::styled(target, theme.text()),
        Span::raw("  "),
        Span::styled(state_text, state_style),
        Span::styled(transport, theme.text_dimmed()),
        Span::raw(" ".repeat(padding)),
        Span::styled(time, theme.text_muted()),
        Span::raw("  "),
    ]);

    frame.render_widget(Paragraph::new(header).style(theme.bar()), area);
}

fn list_title(app: &App) -> String {
    let summary = app.session.summary();
    match app.session.state() {
        WorkflowState::Overwrite { .. } => {
            " These files already exist or were rejected; checked files are overwritten ".to_string()
        }
        _ => format!(
            " {} file(s) selected, {} ",
            summary.file_count,
            format_bytes(summary.total_bytes)
        ),
    }
}

fn draw_files(frame: &mut Frame, app: &App, theme: &ThemeColors, area: Rect) {
    let block = Block::default()
        .title(Span::styled(list_title(app), theme.title()))
        .borders(Borders::ALL)
        .border_style(theme.border_focused())
        .border_set(symbols::border::ROUNDED);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = app.rows();
    if rows.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            "  No files yet. Press a to add a file or folder.",
            theme.text_dimmed(),
        )));
        frame.render_widget(hint, inner);
        return;
    }

    let visible = inner.height as usize;
    let offset = app.cursor.saturating_sub(visible.saturating_sub(1));
    for (i, row) in rows.iter().enumerate().skip(offset).take(visible) {
        let row_area = Rect {
            y: inner.y + (i - offset) as u16,
            height: 1,
            ..inner
        };
        frame.render_widget(FileItem::new(row, theme).selected(i == app.cursor), row_area);
    }
}

fn draw_progress(frame: &mut Frame, app: &App, theme: &ThemeColors, area: Rect) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(theme.border());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(view) = app.session.progress() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let status = match app.session.state() {
        WorkflowState::Completed { files } => Line::from(Span::styled(
            format!("  {} file(s) uploaded, closing…", files),
            theme.success(),
        )),
        _ if app.session.is_loading_local() => Line::from(Span::styled(
            "  Loading files from local disk…",
            theme.info(),
        )),
        _ if !app.session.is_polling() => Line::from(Span::styled(
            format!("  {}, waiting for the server to finish", format_position(view)),
            theme.text_muted(),
        )),
        _ => Line::from(Span::styled(format!("  {}", format_position(view)), theme.text())),
    };
    frame.render_widget(Paragraph::new(status), chunks[0]);

    let gauge = Gauge::default()
        .gauge_style(theme.progress())
        .ratio(ratio(view))
        .label(Span::styled(format_amount(view), theme.text()));
    frame.render_widget(gauge, chunks[1]);
}

fn draw_toast(frame: &mut Frame, app: &App, theme: &ThemeColors, area: Rect) {
    let Some(toast) = app.toasts.current(TOAST_TTL) else {
        return;
    };
    let style = match toast.level {
        Level::Info => theme.info(),
        Level::Warning => theme.warning(),
        Level::Error => theme.error(),
    };
    let line = Line::from(vec![
        Span::styled(format!("  {}: ", toast.level.label()), style),
        Span::styled(toast.message, theme.text()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn hint<'a>(key: &'a str, label: &'a str, control: &Control, theme: &ThemeColors) -> Vec<Span<'a>> {
    if control.enabled {
        vec![
            Span::styled(key, theme.key()),
            Span::styled(format!(":{}  ", label), theme.text_muted()),
        ]
    } else {
        let reason = control.reason.unwrap_or("unavailable");
        vec![Span::styled(
            format!("{}:{} ({})  ", key, label, reason),
            theme.text_dimmed(),
        )]
    }
}

fn draw_footer(frame: &mut Frame, app: &App, theme: &ThemeColors, area: Rect) {
    let controls = app.session.controls();
    let commit_label = match app.session.state() {
        WorkflowState::Overwrite { .. } => "overwrite",
        _ => "upload",
    };

    let mut spans = vec![Span::raw("  ")];
    if app.session.state().is_terminal() {
        spans.push(Span::styled("Enter", theme.key()));
        spans.push(Span::styled(":close  ", theme.text_muted()));
    } else {
        spans.extend(hint("Enter", commit_label, &controls.commit, theme));
        spans.extend(hint("a", "add", &controls.add_files, theme));
        spans.push(Span::styled("Space", theme.key()));
        spans.push(Span::styled(":toggle  ", theme.text_muted()));
        spans.push(Span::styled("Esc", theme.key()));
        spans.push(Span::styled(":cancel", theme.text_muted()));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).style(theme.bar()), area);
}

fn draw_error_popup(
    frame: &mut Frame,
    theme: &ThemeColors,
    message: &str,
    stacktrace: &str,
    show_details: bool,
    area: Rect,
) {
    let width = 70.min(area.width.saturating_sub(4));
    let height = (if show_details { 20 } else { 8 }).min(area.height.saturating_sub(2));
    let popup = centered_rect(width, height, area);

    frame.render_widget(Clear, popup);

    let block = Block::default()
        .title(Span::styled(" Upload failed ", theme.error()))
        .borders(Borders::ALL)
        .border_style(theme.error())
        .border_set(symbols::border::DOUBLE)
        .style(theme.background());
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(message.to_string(), theme.text())),
        Line::from(""),
    ];
    if show_details {
        for trace_line in stacktrace.lines() {
            lines.push(Line::from(Span::styled(trace_line.to_string(), theme.text_muted())));
        }
        lines.push(Line::from(""));
    }
    let details = if show_details { "hide" } else { "show" };
    lines.push(Line::from(vec![
        Span::styled("Enter", theme.key()),
        Span::styled(":close  ", theme.text_dimmed()),
        Span::styled("d", theme.key()),
        Span::styled(format!(":{} details", details), theme.text_dimmed()),
    ]));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_path_popup(frame: &mut Frame, theme: &ThemeColors, input: &str, area: Rect) {
    let width = 64.min(area.width.saturating_sub(4));
    let height = 5.min(area.height.saturating_sub(2));
    let popup = centered_rect(width, height, area);

    frame.render_widget(Clear, popup);

    let block = Block::default()
        .title(Span::styled(" Add file or folder ", theme.title()))
        .borders(Borders::ALL)
        .border_style(theme.border_focused())
        .border_set(symbols::border::ROUNDED)
        .style(theme.background());
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let lines = vec![
        Line::from(vec![
            Span::styled("> ", theme.key()),
            Span::styled(input.to_string(), theme.text()),
            Span::styled("_", theme.key()),
        ]),
        Line::from(""),
        Line::from(Span::styled("Enter:add  Esc:close", theme.text_dimmed())),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Create a centered rectangle
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
