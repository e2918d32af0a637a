use crate::report::format_distance;
use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the raw reading log panel
pub fn render_scan_log(frame: &mut Frame, area: Rect, app: &App) {
    let title = if app.log_scroll > 0 {
        format!(" Readings [scrolled +{}] [j/k] ", app.log_scroll)
    } else {
        " Readings [j/k scroll] ".to_string()
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let visible = area.height.saturating_sub(2) as usize;
    let total = app.scan_log.len();

    // Newest at the bottom; scroll offset walks back into history
    let end = total.saturating_sub(app.log_scroll);
    let start = end.saturating_sub(visible);

    let lines: Vec<Line> = app
        .scan_log
        .iter()
        .skip(start)
        .take(end - start)
        .map(|entry| {
            let timestamp = chrono::DateTime::from_timestamp_millis(entry.timestamp_ms)
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".to_string());

            let distance = entry
                .distance_m
                .map(format_distance)
                .unwrap_or_else(|| "N/A".to_string());

            Line::from(vec![
                Span::styled(format!("[{}] ", timestamp), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<12}", entry.identity),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(format!(
                    " {:4}dBm -> {:4}dBm  ~{}",
                    entry.raw_rssi, entry.smoothed_rssi, distance
                )),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
