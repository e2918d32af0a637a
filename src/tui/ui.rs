use crate::tui::app::App;
use crate::tui::widgets::{
    beacon_table::render_beacon_table, help_overlay::render_help, scan_log::render_scan_log,
    status_bar::render_status_bar, zone_panel::render_zone_panel,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Main draw function for the TUI
pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();

    // Main layout: Header, Zone panel, Content, Status bar
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(7), // Zone panel
            Constraint::Min(8),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(size);

    draw_header(frame, main_chunks[0]);
    render_zone_panel(frame, main_chunks[1], app);

    // Content: beacon table on top, reading log below
    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(55), // Beacon table
            Constraint::Percentage(45), // Reading log
        ])
        .split(main_chunks[2]);

    render_beacon_table(frame, content_chunks[0], app);
    render_scan_log(frame, content_chunks[1], app);

    render_status_bar(frame, main_chunks[3], app);

    if app.show_help {
        render_help(frame, size);
    }
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let title = vec![
        Span::styled(
            " DOCENT ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled("Room Beacon Proximity Tracker", Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled("[?] Help  [q] Quit", Style::default().fg(Color::DarkGray)),
    ];

    let header = Paragraph::new(Line::from(title)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(header, area);
}
