//! Rendering.

use crate::app::App;
use crate::decompile::DecompileSlot;
use hooklens_engine::{Change, DiffEntry};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

/// Top-level frame layout: one header line, then the main panes.
pub fn ui(f: &mut Frame<'_>, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(f.area());

    render_header(f, chunks[0]);
    render_main(f, chunks[1], app);
}

fn render_header(f: &mut Frame<'_>, area: Rect) {
    let shortcuts_text = "j/k Methods  n/p Patch  t Toggle  d Decompile  r Refresh  q Quit";
    let shortcuts_len = shortcuts_text.len() as u16;

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(shortcuts_len)])
        .split(area);

    let logo = Paragraph::new(Line::from(Span::styled(
        " Hooklens ",
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));

    let key = |s: &'static str| Span::styled(s, Style::default().fg(Color::Yellow));
    let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));
    let shortcuts = Line::from(vec![
        key("j/k"),
        label(" Methods  "),
        key("n/p"),
        label(" Patch  "),
        key("t"),
        label(" Toggle  "),
        key("d"),
        label(" Decompile  "),
        key("r"),
        label(" Refresh  "),
        key("q"),
        label(" Quit"),
    ]);

    f.render_widget(logo, chunks[0]);
    f.render_widget(
        Paragraph::new(shortcuts).alignment(ratatui::layout::Alignment::Right),
        chunks[1],
    );
}

fn render_main(f: &mut Frame<'_>, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    render_method_list(f, chunks[0], app);
    render_detail(f, chunks[1], app);
}

fn render_method_list(f: &mut Frame<'_>, area: Rect, app: &mut App) {
    app.list_area = area;

    let items: Vec<ListItem<'_>> = app
        .methods
        .iter()
        .enumerate()
        .map(|(i, method)| {
            let style = if i == app.selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(method.display_name()).style(style)
        })
        .collect();

    let title_right = format!(" {} patched ", app.methods.len());
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Patched Methods ")
                .title(Line::from(title_right).right_aligned())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_detail(f: &mut Frame<'_>, area: Rect, app: &mut App) {
    app.detail_area = area;

    let (title, lines) = if app.show_decompile {
        (" Decompiled ", decompile_lines(app))
    } else {
        (" IL Diff ", diff_lines(app))
    };

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        )
        .scroll((app.detail_scroll, 0))
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}

fn decompile_lines(app: &App) -> Vec<Line<'static>> {
    let guard = app.decompile.lock().expect("decompile lock");
    match guard.slot() {
        DecompileSlot::Idle => vec![Line::from(Span::styled(
            "Press d to decompile the selected type",
            Style::default().fg(Color::DarkGray),
        ))],
        DecompileSlot::Pending => vec![Line::from(Span::styled(
            "Decompiling...",
            Style::default().fg(Color::Yellow),
        ))],
        DecompileSlot::Ready(text) => text.lines().map(|l| Line::from(l.to_string())).collect(),
        DecompileSlot::Failed(msg) => vec![Line::from(Span::styled(
            format!("Decompilation failed: {msg}"),
            Style::default().fg(Color::Red),
        ))],
    }
}

fn diff_lines(app: &App) -> Vec<Line<'static>> {
    let Some(diff) = app.diff.as_ref() else {
        return vec![Line::from(Span::styled(
            "No diff available for this method",
            Style::default().fg(Color::DarkGray),
        ))];
    };

    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        format!("═══ {} ═══", diff.method.display_name()),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));

    // Patch sub-list with applied markers and the toggle cursor.
    lines.push(Line::from(Span::styled(
        "Patches:",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    let patches = app.current_patches();
    if patches.is_empty() {
        lines.push(Line::from(Span::styled(
            "  (none)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (i, patch) in patches.iter().enumerate() {
        let cursor = if i == app.patch_cursor { ">" } else { " " };
        let marker = if patch.is_applied() { "[x]" } else { "[ ]" };
        let kind = if patch.is_rewrite() { "IL" } else { "On" };
        let style = if i == app.patch_cursor {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{cursor} {marker} {kind}: {}", patch.identity()),
            style,
        )));
    }
    lines.push(Line::from(""));

    let (unchanged, added, removed) = diff.counts();
    lines.push(Line::from(format!(
        "{unchanged} unchanged, {added} added, {removed} removed"
    )));
    lines.push(Line::from(""));

    for entry in &diff.entries {
        lines.extend(entry_lines(entry));
    }

    lines
}

fn entry_lines(entry: &DiffEntry) -> Vec<Line<'static>> {
    let mut spans = Vec::new();
    let (prefix, style) = match entry.change {
        Change::Unchanged => ("  ", Style::default().fg(Color::DarkGray)),
        Change::Added => ("+ ", Style::default().fg(Color::Green)),
        Change::Removed => ("- ", Style::default().fg(Color::Red)),
    };
    spans.push(Span::styled(
        format!("{prefix}{}", entry.instruction),
        style,
    ));
    if let Some(source) = &entry.source {
        spans.push(Span::styled(
            format!(" @ {source}"),
            Style::default().fg(Color::Yellow),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    for note in &entry.notes {
        lines.push(Line::from(Span::styled(
            format!("  |-> {note}"),
            Style::default().fg(Color::Cyan),
        )));
    }
    lines
}
