//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! * The layout is a two-row split: the card list on top and a one-line
//!   status bar at the bottom.
//! * Each card is one multi-line list item.  The front shows the avatar,
//!   name and headlines; the back shows each article's summary and link.
//! * There are no images in a terminal, so the avatar is always the
//!   initials badge the web client falls back to.

use chrono::Local;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::app::App;
use crate::source::PersonCard;
use crate::sync::SyncMode;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [main_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_cards(app, frame, main_area);
    draw_status_bar(app, frame, status_area);
}

fn card_front(card: &PersonCard) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("[{:^2}]", card.initials()),
            Style::default().fg(Color::Black).bg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(&card.name, Style::default().add_modifier(Modifier::BOLD)),
    ])];

    for article in &card.articles {
        let date_str = article
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "no date".into());
        lines.push(Line::from(vec![
            Span::raw("     "),
            Span::styled(format!("{date_str:<10}"), Style::default().fg(Color::DarkGray)),
            Span::raw(" "),
            Span::styled(&article.title, Style::default().fg(Color::White)),
        ]));
    }
    lines
}

fn card_back(card: &PersonCard) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("[{:^2}]", card.initials()),
            Style::default().fg(Color::Black).bg(Color::Magenta),
        ),
        Span::raw(" "),
        Span::styled(&card.name, Style::default().add_modifier(Modifier::BOLD)),
    ])];

    for article in &card.articles {
        lines.push(Line::from(vec![
            Span::raw("     "),
            Span::styled(&article.summary, Style::default().fg(Color::White)),
        ]));
        if let Some(link) = &article.link {
            lines.push(Line::from(vec![
                Span::raw("     "),
                Span::styled(link, Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED)),
            ]));
        }
    }
    lines
}

/// Render the scrollable card list.
fn draw_cards(app: &mut App, frame: &mut Frame, area: Rect) {
    let cards = app.cards().clone();
    let list_items: Vec<ListItem> = cards
        .iter()
        .map(|card| {
            let lines = if app.is_flipped(card) {
                card_back(card)
            } else {
                card_front(card)
            };
            ListItem::new(lines)
        })
        .collect();

    let title = if app.view.loading {
        " People in the News (loading…) ".to_string()
    } else {
        " People in the News ".to_string()
    };

    let list = List::new(list_items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let view = &app.view;

    let (status, colour) = match (&view.error, view.loading) {
        (Some(err), _) => (err.clone(), Color::Red),
        (None, true) => ("Loading…".to_string(), Color::Yellow),
        (None, false) => match view.last_updated {
            Some(ts) => (
                format!("Updated {}", ts.with_timezone(&Local).format("%H:%M:%S")),
                Color::Yellow,
            ),
            None => ("Waiting for data".to_string(), Color::Yellow),
        },
    };

    let mode = match view.mode {
        SyncMode::Push => "live",
        SyncMode::Polling => "polling",
    };

    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(status, Style::default().fg(colour)),
        Span::raw("  "),
        Span::styled(format!("[{mode}]"), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(
            format!("{} people", view.cards.len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  q: quit  ↑/↓: scroll  space: flip  r: refresh"),
    ]));
    frame.render_widget(status, area);
}
