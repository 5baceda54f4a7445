//! Rendering. Reads [`App`] state only; all mutation happens in `update`.

use herd_core::{shorten_path, Session, ViewItem};
use herd_protocol::SessionState;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::overlay::{Picker, Prompt, WorktreeList};
use crate::app::{App, Mode, FOOTER_ROWS, HEADER_ROWS, OUTPUT_HEADER_ROWS};

pub fn draw(f: &mut Frame, app: &App) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(HEADER_ROWS),
        Constraint::Min(0),
        Constraint::Length(FOOTER_ROWS),
    ])
    .areas(f.area());

    // The sidebar's right border takes one column past its content width.
    let [sidebar, output] = Layout::horizontal([
        Constraint::Length(app.sidebar_width() + 1),
        Constraint::Min(0),
    ])
    .areas(body);

    render_header(f, app, header);
    render_sidebar(f, app, sidebar);
    render_output(f, app, output);
    render_footer(f, app, footer);

    match &app.mode {
        Mode::Normal | Mode::Filter(_) => {}
        Mode::Rename { prompt, .. } => render_prompt(f, "Rename session (empty clears)", prompt),
        Mode::GroupAssign { prompt, .. } => render_prompt(f, "Group (empty ungroups)", prompt),
        Mode::Review { prompt, .. } => render_prompt(f, "Feedback for the agent", prompt),
        Mode::Picker(picker) => render_picker(f, picker),
        Mode::Worktree(list) => render_worktrees(f, list),
    }
}

fn state_style(state: SessionState) -> (&'static str, Color) {
    match state {
        SessionState::Working => ("◐", Color::Yellow),
        SessionState::Waiting => ("●", Color::Green),
        SessionState::PlanReady => ("◆", Color::Magenta),
        SessionState::Notifying => ("◉", Color::Red),
        SessionState::Idle => ("○", Color::DarkGray),
        SessionState::Unknown => ("·", Color::DarkGray),
    }
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" ◆ ", Style::default().fg(Color::Cyan)),
        Span::styled(
            "herd ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("({} sessions) ", app.sessions.len()), dim()),
    ];
    if let Some(session) = app.selected_session() {
        let home = dirs::home_dir();
        spans.push(Span::styled(
            shorten_path(&session.project_path, home.as_deref()),
            Style::default().fg(Color::Gray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(dim());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let bar_rows = u16::from(app.shows_filter_bar());
    let [bar, list] =
        Layout::vertical([Constraint::Length(bar_rows), Constraint::Min(0)]).areas(inner);
    if app.shows_filter_bar() {
        let query = match &app.mode {
            Mode::Filter(prompt) => format!("{}▏", prompt.value),
            _ => app.filter.clone(),
        };
        let line = Line::from(vec![
            Span::styled(" / ", Style::default().fg(Color::Cyan)),
            Span::raw(query),
        ]);
        f.render_widget(Paragraph::new(line), bar);
    }

    let mut lines: Vec<Line> = Vec::new();

    if app.sessions.is_empty() {
        let hint = if app.discovered {
            " No agent sessions"
        } else {
            " Discovering…"
        };
        lines.push(Line::from(Span::styled(hint, dim())));
        f.render_widget(Paragraph::new(lines), list);
        return;
    }

    let pinned = app.stores.sidebar.snapshot();
    for item in app.view_items() {
        match item {
            ViewItem::Header {
                group,
                count,
                state,
                collapsed,
            } => {
                let (icon, color) = state_style(state);
                let on_cursor = app.cursor_on_group.as_deref() == Some(group.as_str());
                let arrow = if collapsed { "▸" } else { "▾" };
                let style = if on_cursor {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("{arrow} {group} "), style),
                    Span::styled(format!("({count}) "), dim()),
                    Span::styled(icon, Style::default().fg(color)),
                ]));
            }
            ViewItem::Row { index, group } => {
                let Some(session) = app.sessions.get(index) else {
                    continue;
                };
                let selected = index == app.selected && app.cursor_on_group.is_none();
                let indent = if group.is_some() { "  " } else { "" };
                let is_pinned = pinned.is_pinned(&session.key());
                lines.extend(session_lines(app, session, indent, selected, is_pinned));
            }
        }
    }
    f.render_widget(
        Paragraph::new(lines).scroll((app.sidebar_scroll(), 0)),
        list,
    );
}

fn session_lines(
    app: &App,
    session: &Session,
    indent: &str,
    selected: bool,
    pinned: bool,
) -> [Line<'static>; 2] {
    let (icon, color) = state_style(session.state);
    let marker = if selected { "▌" } else { " " };
    let name_style = if selected {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let mut name = vec![
        Span::styled(marker.to_string(), Style::default().fg(Color::Cyan)),
        Span::raw(indent.to_string()),
        Span::styled(format!("{icon} "), Style::default().fg(color)),
        Span::styled(app.label_for(session), name_style),
    ];
    if pinned {
        name.push(Span::styled(" ^", Style::default().fg(Color::Cyan)));
    }

    let mut meta = Vec::new();
    if !session.git_branch.is_empty() {
        meta.push(session.git_branch.clone());
    }
    match &session.current_tool {
        Some(tool) => meta.push(tool.clone()),
        None => meta.push(session.state.as_str().replace('_', " ")),
    }
    let meta = Line::from(vec![
        Span::raw(format!(" {indent}  ")),
        Span::styled(meta.join(" · "), dim()),
    ]);
    [Line::from(name), meta]
}

fn render_output(f: &mut Frame, app: &App, area: Rect) {
    let [title, view] = Layout::vertical([
        Constraint::Length(OUTPUT_HEADER_ROWS),
        Constraint::Min(0),
    ])
    .areas(area);

    let Some(session) = app.selected_session() else {
        return;
    };

    let (icon, color) = state_style(session.state);
    let mut spans = vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color)),
        Span::styled(session.state.as_str().replace('_', " "), Style::default().fg(color)),
        Span::styled(format!("  {}", session.pane_id), dim()),
    ];
    if app.insert {
        spans.push(Span::styled(
            "  INSERT",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if app.scroll_from_bottom > 0 {
        spans.push(Span::styled(format!("  ↑{}", app.scroll_from_bottom), dim()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), title);

    let total = app.output.lines().count();
    let top = total.saturating_sub(usize::from(view.height) + app.scroll_from_bottom);
    let top = u16::try_from(top).unwrap_or(u16::MAX);
    f.render_widget(
        Paragraph::new(Text::raw(app.output.as_str())).scroll((top, 0)),
        view,
    );
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.status_text() {
        Some(text) => Line::from(Span::styled(format!(" {text}"), Style::default().fg(Color::Cyan))),
        None => help_line(app),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn help_line(app: &App) -> Line<'static> {
    let keys: &[(&str, &str)] = if app.insert {
        &[("C-h", "Exit insert")]
    } else {
        match &app.mode {
            Mode::Filter(_) => &[("Enter", "Keep"), ("Esc", "Clear"), ("↑↓", "Nav")],
            Mode::Picker(_) => &[("Enter", "Launch"), ("Esc", "Cancel"), ("↑↓", "Nav")],
            Mode::Worktree(_) => &[("Enter", "Open"), ("Esc", "Cancel"), ("jk", "Nav")],
            Mode::Rename { .. } | Mode::GroupAssign { .. } | Mode::Review { .. } => {
                &[("Enter", "Save"), ("Esc", "Cancel")]
            }
            Mode::Normal => &[
                ("jk", "Nav"),
                ("JK", "Move"),
                ("p", "Pin"),
                ("i", "Insert"),
                ("t", "Jump"),
                ("n", "New"),
                ("/", "Filter"),
                ("g", "Group"),
                ("R", "Rename"),
                ("d", "Review"),
                ("w", "Worktrees"),
                ("x", "Kill"),
                ("q", "Quit"),
            ],
        }
    };
    let spans = keys
        .iter()
        .flat_map(|(key, label)| {
            [
                Span::styled(format!(" [{key}]"), dim()),
                Span::styled(format!(" {label} "), Style::default().fg(Color::Gray)),
            ]
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

// ─────────────────────────────────────────────────────────────────────────────
// Popups
// ─────────────────────────────────────────────────────────────────────────────

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn popup(f: &mut Frame, title: &str, area: Rect) -> Rect {
    let block = Block::default()
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);
    inner
}

fn render_prompt(f: &mut Frame, title: &str, prompt: &Prompt) {
    let area = centered(f.area(), 60, 3);
    let inner = popup(f, title, area);
    f.render_widget(Paragraph::new(format!("{}▏", prompt.value)), inner);
}

fn render_picker(f: &mut Frame, picker: &Picker) {
    let area = centered(f.area(), 70, 20);
    let inner = popup(f, "New session", area);
    let [query, list] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}▏", picker.query.value)),
        ])),
        query,
    );

    if picker.loading {
        f.render_widget(Paragraph::new(Span::styled("Scanning…", dim())), list);
        return;
    }
    let home = dirs::home_dir();
    let filtered = picker.filtered();
    let visible = usize::from(list.height);
    let first = picker.selected.saturating_sub(visible.saturating_sub(1));
    let lines: Vec<Line> = filtered
        .iter()
        .enumerate()
        .skip(first)
        .take(visible)
        .map(|(i, path)| {
            let label = shorten_path(path, home.as_deref());
            if i == picker.selected && picker.typed_path().is_none() {
                Line::from(Span::styled(
                    format!("▌{label}"),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(format!(" {label}"), Style::default().fg(Color::Gray)))
            }
        })
        .collect();
    f.render_widget(Paragraph::new(lines), list);
}

fn render_worktrees(f: &mut Frame, list: &WorktreeList) {
    let height = u16::try_from(list.worktrees.len()).unwrap_or(u16::MAX).saturating_add(2);
    let area = centered(f.area(), 70, height.min(20));
    let title = format!("Worktrees of {}", list.repo_root);
    let inner = popup(f, &title, area);
    let lines: Vec<Line> = list
        .worktrees
        .iter()
        .enumerate()
        .map(|(i, worktree)| {
            let branch = if worktree.branch.is_empty() {
                "detached".to_string()
            } else {
                worktree.branch.clone()
            };
            let style = if i == list.selected {
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let marker = if i == list.selected { "▌" } else { " " };
            Line::from(vec![
                Span::styled(format!("{marker}{branch} "), style),
                Span::styled(worktree.path.clone(), dim()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}
