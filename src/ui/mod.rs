use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap};
use ratatui::Frame;
use strum::IntoEnumIterator;
use unicode_width::UnicodeWidthStr;

use crate::app::form::FormField;
use crate::app::state::{AppState, DateBound, DeleteConfirmation, InputMode, View};
use crate::records::{format_iso_date, Incident, IncidentStatus, RecordStore};
use crate::report::{IncidentBreakdown, Report};

const SEARCH_LABEL: &str = "Search: ";

pub fn draw_app(
    frame: &mut Frame,
    state: &AppState,
    store: &RecordStore,
    table_state: &mut TableState,
    max_results: usize,
) {
    let view = state.view();
    let mut constraints = vec![Constraint::Length(3)];
    if view.shows_search_bar() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(3));
    constraints.push(Constraint::Length(2));

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.size());

    draw_tabs(frame, state, rows[0]);
    let body = if view.shows_search_bar() {
        draw_search_bar(frame, state, rows[1]);
        rows[2]
    } else {
        rows[1]
    };

    match view {
        View::Dashboard => draw_dashboard(frame, state, store, table_state, body, max_results),
        View::List => {
            let incidents = state.visible_incidents(store);
            draw_incident_table(frame, state.title(), &incidents, table_state, body, max_results);
        }
        View::Daily => draw_daily(frame, state, store, table_state, body, max_results),
        View::Reports => draw_reports(frame, store, body),
        View::Analysis => draw_analysis(frame, state, store, body),
        View::Form => draw_form(frame, state, body),
    }

    let status = Paragraph::new(build_status_line(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(status, rows[rows.len() - 1]);

    if let Some(incident) = state.viewing() {
        draw_detail(frame, incident);
    }
    if let DeleteConfirmation::Pending { label, .. } = state.delete_confirmation() {
        draw_delete_confirmation(frame, label);
    }
    if let InputMode::Summary { buffer } = state.input_mode() {
        draw_summary_entry(frame, buffer);
    }
}

fn draw_tabs(frame: &mut Frame, state: &AppState, area: Rect) {
    let titles: Vec<Line> = View::iter().map(|view| Line::from(view.label())).collect();
    let tabs = Tabs::new(titles)
        .select(state.view().position())
        .block(
            Block::default()
                .title(state.title())
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn draw_search_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let filter = state.filter();
    let active = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let (term_style, start_style, end_style) = match state.input_mode() {
        InputMode::Term => (active, Style::default(), Style::default()),
        InputMode::Date {
            bound: DateBound::Start,
            ..
        } => (Style::default(), active, Style::default()),
        InputMode::Date {
            bound: DateBound::End,
            ..
        } => (Style::default(), Style::default(), active),
        InputMode::Normal | InputMode::Summary { .. } => {
            (Style::default(), Style::default(), Style::default())
        }
    };
    let bound_text = |bound: DateBound| match state.input_mode() {
        InputMode::Date { bound: editing, buffer } if *editing == bound => format!("{buffer}▌"),
        _ => {
            let value = match bound {
                DateBound::Start => filter.start,
                DateBound::End => filter.end,
            };
            value.map(format_iso_date).unwrap_or_else(|| "----------".to_string())
        }
    };
    let status = match filter.status {
        Some(status) => status.to_string(),
        None => "all".to_string(),
    };

    let line = Line::from(vec![
        Span::raw(SEARCH_LABEL),
        Span::styled(filter.term.clone(), term_style),
        Span::raw("   From: "),
        Span::styled(bound_text(DateBound::Start), start_style),
        Span::raw("   To: "),
        Span::styled(bound_text(DateBound::End), end_style),
        Span::raw("   Status: "),
        Span::raw(status),
    ]);
    let border = if state.is_searching() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .title("Filters")
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(paragraph, area);

    if matches!(state.input_mode(), InputMode::Term) {
        let offset = (SEARCH_LABEL.width() + filter.term.width()) as u16;
        let x = area.x.saturating_add(1).saturating_add(offset);
        frame.set_cursor(x.min(area.right().saturating_sub(2)), area.y + 1);
    }
}

fn draw_dashboard(
    frame: &mut Frame,
    state: &AppState,
    store: &RecordStore,
    table_state: &mut TableState,
    area: Rect,
    max_results: usize,
) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let totals = IncidentBreakdown::from_incidents(store.incidents());
    let selected = |status: IncidentStatus| {
        if state.filter().status == Some(status) {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        }
    };
    let cards = Line::from(vec![
        Span::raw("Total "),
        Span::styled(totals.total.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("   "),
        Span::styled(format!("[o] Open {}", totals.open), selected(IncidentStatus::Open)),
        Span::raw("   "),
        Span::styled(
            format!("[c] Concluded {}", totals.concluded),
            selected(IncidentStatus::Concluded),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(cards).block(Block::default().title("Overview").borders(Borders::ALL)),
        parts[0],
    );

    let incidents = state.visible_incidents(store);
    let title = if state.is_searching() {
        "Search results"
    } else {
        "Recent incidents"
    };
    draw_incident_table(frame, title, &incidents, table_state, parts[1], max_results);
}

fn draw_incident_table(
    frame: &mut Frame,
    title: &str,
    incidents: &[&Incident],
    table_state: &mut TableState,
    area: Rect,
    max_results: usize,
) {
    let header = Row::new(vec!["Date", "Number", "SIGMA", "Nature", "Address", "Status"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = incidents
        .iter()
        .take(max_results)
        .map(|incident| {
            Row::new(vec![
                Cell::from(incident.display_date().unwrap_or_else(|| incident.date.clone())),
                Cell::from(incident.incident_number.clone()),
                Cell::from(incident.sigma.clone()),
                Cell::from(incident.kind.clone()),
                Cell::from(incident.location.address.clone()),
                Cell::from(Span::styled(
                    incident.status.to_string(),
                    status_style(incident.status),
                )),
            ])
        })
        .collect();

    let title = if incidents.len() > max_results {
        format!("{title} ({} of {})", max_results, incidents.len())
    } else {
        format!("{title} ({})", incidents.len())
    };
    let widths = [
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(14),
        Constraint::Percentage(25),
        Constraint::Percentage(35),
        Constraint::Length(10),
    ];
    if rows.is_empty() {
        let empty = Paragraph::new("No incidents match the current filters.")
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    }
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn draw_daily(
    frame: &mut Frame,
    state: &AppState,
    store: &RecordStore,
    table_state: &mut TableState,
    area: Rect,
    max_results: usize,
) {
    let summaries = state.visible_summaries(store);
    let title = format!("Daily summaries ({})", summaries.len());
    if summaries.is_empty() {
        let empty = Paragraph::new(
            "No daily summaries recorded. Press a to enter a day, or use `incident-desk summary DATE LABEL=COUNT`.",
        )
        .wrap(Wrap { trim: true })
        .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    }
    let rows: Vec<Row> = summaries
        .iter()
        .take(max_results)
        .map(|summary| {
            let natures: Vec<&str> = summary.natures_with_records().collect();
            Row::new(vec![
                Cell::from(summary.display_date()),
                Cell::from(summary.total().to_string()),
                Cell::from(natures.join(", ")),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["Date", "Total", "Natures with records"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().title(title).borders(Borders::ALL))
    .highlight_style(Style::default().bg(Color::Blue).fg(Color::Black))
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn draw_reports(frame: &mut Frame, store: &RecordStore, area: Rect) {
    let report = Report::build(store.incidents(), store.summaries(), None, None);
    let paragraph = Paragraph::new(report.render())
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Report").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn draw_analysis(frame: &mut Frame, state: &AppState, store: &RecordStore, area: Rect) {
    let breakdown = IncidentBreakdown::from_incidents(state.visible_incidents(store));
    let widest = breakdown
        .by_type
        .iter()
        .map(|(kind, _)| kind.width())
        .max()
        .unwrap_or(0);
    let peak = breakdown.by_type.first().map_or(1, |(_, count)| *count).max(1);
    let bar_room = (area.width as usize).saturating_sub(widest + 12).max(1);

    let mut lines = vec![
        Line::from(format!(
            "{} incident(s): {} open, {} concluded",
            breakdown.total, breakdown.open, breakdown.concluded
        )),
        Line::from(""),
    ];
    for (kind, count) in &breakdown.by_type {
        let bar = "█".repeat((count * bar_room / peak).max(1));
        let padding = " ".repeat(widest - kind.width());
        lines.push(Line::from(vec![
            Span::raw(format!("{kind}{padding} ")),
            Span::styled(bar, Style::default().fg(Color::Cyan)),
            Span::raw(format!(" {count}")),
        ]));
    }
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Incidents by nature")
            .borders(Borders::ALL),
    );
    frame.render_widget(paragraph, area);
}

fn draw_form(frame: &mut Frame, state: &AppState, area: Rect) {
    let Some(form) = state.form() else {
        return;
    };
    let mut lines = Vec::new();
    for field in FormField::iter() {
        let focused = form.focus() == field;
        let marker = if field.is_required() { "*" } else { " " };
        let label_style = if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut value = form.value(field).to_string();
        if focused && field != FormField::Status {
            value.push('▌');
        }
        lines.push(Line::from(vec![
            Span::styled(format!("{marker}{:<24}", field.label()), label_style),
            Span::raw(value),
        ]));
    }
    lines.push(Line::from(""));
    let save_hint = if form.is_editing() {
        "Ctrl-s save changes"
    } else {
        "Ctrl-s register"
    };
    lines.push(Line::from(Span::styled(
        format!("Tab/Shift-Tab move • space toggles status • {save_hint} • Esc cancel"),
        Style::default().fg(Color::Gray),
    )));
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(state.title())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(paragraph, area);
}

fn draw_detail(frame: &mut Frame, incident: &Incident) {
    let area = centered_rect(70, 70, frame.size());
    frame.render_widget(Clear, area);
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |label: &str, value: &str| {
        Line::from(vec![
            Span::styled(format!("{label}: "), bold),
            Span::raw(value.to_string()),
        ])
    };
    let mut lines = vec![
        field("Number", &incident.incident_number),
        field("SIGMA", &incident.sigma),
        field("Nature", &incident.kind),
        field("Date", &incident.display_datetime()),
        field("Address", &incident.location.address),
        Line::from(vec![
            Span::styled("Status: ", bold),
            Span::styled(incident.status.to_string(), status_style(incident.status)),
        ]),
    ];
    for (label, value) in [
        ("Victim", &incident.victim),
        ("Garrison", &incident.garrison),
        ("Vehicle", &incident.vehicle_details),
        ("Stolen items", &incident.stolen_details),
    ] {
        if let Some(value) = value {
            lines.push(field(label, value));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(incident.description.clone()));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Registered by {} at {}", incident.reported_by, incident.created_at),
        Style::default().fg(Color::Gray),
    )));
    lines.push(Line::from(Span::styled(
        "e edit • d delete • Esc close",
        Style::default().fg(Color::Gray),
    )));
    let paragraph = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Incident")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(paragraph, area);
}

fn draw_delete_confirmation(frame: &mut Frame, label: &str) {
    let area = centered_rect(50, 25, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("Delete incident {label}?"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("This cannot be undone."),
        Line::from(""),
        Line::from(Span::styled(
            "Enter/y confirm • Esc/n cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title("Confirm delete")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_summary_entry(frame: &mut Frame, buffer: &str) {
    let area = centered_rect(70, 25, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(format!("{buffer}▌")),
        Line::from(""),
        Line::from(Span::styled(
            "YYYY-MM-DD LABEL=COUNT, LABEL=COUNT • an existing day is replaced",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title("Daily summary")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let hints = match (state.view(), state.input_mode()) {
        (_, InputMode::Term) => "type to search • Enter done • Esc clear",
        (_, InputMode::Date { .. }) => "YYYY-MM-DD • Enter apply • Esc cancel",
        (_, InputMode::Summary { .. }) => "Enter save • Esc cancel",
        (View::Form, _) => "Tab move • Ctrl-s save • Esc back",
        (View::Daily, _) => {
            "←/→ views • / search • f from • t to • x clear • a add day • e edit day • q quit"
        }
        (view, _) if view.shows_search_bar() => {
            "←/→ views • / search • f from • t to • x clear • Enter open • n new • e edit • d delete • q quit"
        }
        _ => "←/→ views • n new • q quit",
    };
    let mut spans = vec![Span::raw(hints)];
    if let Some(message) = state.status_message() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }
    Text::from(Line::from(spans))
}

fn status_style(status: IncidentStatus) -> Style {
    match status {
        IncidentStatus::Open => Style::default().fg(Color::Red),
        IncidentStatus::Concluded => Style::default().fg(Color::Green),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
