use crate::distance::estimate_distance;
use crate::registry::ActivityState;
use crate::tui::app::App;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

/// Render the tracked beacon table
pub fn render_beacon_table(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Beacons (strongest first) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let header_cells = ["Identity", "RSSI", "Smoothed", "Distance", "Battery", "FW", "State", "Last Seen"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .snapshot
        .beacons
        .iter()
        .map(|beacon| {
            let last_seen = chrono::DateTime::from_timestamp_millis(beacon.last_seen_ms)
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "Unknown".to_string());

            // Per-row model distance from this beacon's own smoothed signal
            let distance = estimate_distance(
                beacon.smoothed_rssi,
                app.reference_power_dbm,
                app.path_loss_exponent,
            );

            let signal_color = if beacon.smoothed_rssi >= -50 {
                Color::Green
            } else if beacon.smoothed_rssi >= -70 {
                Color::Yellow
            } else {
                Color::Red
            };

            let (state_str, state_color) = match beacon.activity {
                ActivityState::Active => ("active", Color::Green),
                ActivityState::Inactive => ("inactive", Color::DarkGray),
            };

            // Beacon battery: 3.0 V is getting low for a coin cell pair
            let battery_color = if beacon.battery_mv >= 3300 {
                Color::Green
            } else if beacon.battery_mv >= 3000 {
                Color::Yellow
            } else {
                Color::Red
            };

            let cells = vec![
                Cell::from(beacon.identity.clone()),
                Cell::from(format!("{}dBm", beacon.raw_rssi)),
                Cell::from(format!("{}dBm", beacon.smoothed_rssi))
                    .style(Style::default().fg(signal_color)),
                Cell::from(format!("{:.1}m", distance)),
                Cell::from(format!("{}mV", beacon.battery_mv))
                    .style(Style::default().fg(battery_color)),
                Cell::from(beacon.firmware_version.clone()),
                Cell::from(state_str).style(Style::default().fg(state_color)),
                Cell::from(last_seen),
            ];

            Row::new(cells).height(1)
        })
        .collect();

    let widths = [
        Constraint::Length(14), // Identity
        Constraint::Length(8),  // RSSI
        Constraint::Length(9),  // Smoothed
        Constraint::Length(9),  // Distance
        Constraint::Length(8),  // Battery
        Constraint::Length(5),  // FW
        Constraint::Length(9),  // State
        Constraint::Min(8),     // Last Seen
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);

    let count_str = format!(" {} tracked ", app.snapshot.beacons.len());
    let count_len = count_str.len() as u16;
    let count_x = area.x + area.width.saturating_sub(count_len + 2);

    if count_x > area.x {
        frame.render_widget(
            ratatui::widgets::Paragraph::new(count_str)
                .style(Style::default().fg(Color::DarkGray)),
            Rect::new(count_x, area.y, count_len, 1),
        );
    }
}
