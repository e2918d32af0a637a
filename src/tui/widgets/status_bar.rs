use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the bottom status bar
pub fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let elapsed = app.started.elapsed().as_secs();
    let elapsed_str = format!("{:02}:{:02}:{:02}", elapsed / 3600, (elapsed / 60) % 60, elapsed % 60);

    let (source_str, source_color) = if app.source_ended {
        ("source ended", Color::Red)
    } else {
        ("receiving", Color::Green)
    };

    let narration_str = if app.narration_enabled { "on" } else { "off" };

    let content = Line::from(vec![
        Span::styled(" ● ", Style::default().fg(source_color)),
        Span::styled(source_str, Style::default().fg(source_color)),
        Span::raw("  |  "),
        Span::styled("Readings: ", Style::default().fg(Color::Yellow)),
        Span::raw(app.readings.to_string()),
        Span::raw("  |  "),
        Span::styled("Beacons: ", Style::default().fg(Color::Yellow)),
        Span::raw(app.snapshot.beacons.len().to_string()),
        Span::raw("  |  "),
        Span::styled("Guide [n]: ", Style::default().fg(Color::Yellow)),
        Span::raw(narration_str),
        Span::raw("  |  "),
        Span::styled("Elapsed: ", Style::default().fg(Color::Yellow)),
        Span::raw(elapsed_str),
        Span::raw("  |  "),
        Span::styled("[?] help [q] quit", Style::default().fg(Color::DarkGray)),
    ]);

    let bar = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(bar, area);
}
