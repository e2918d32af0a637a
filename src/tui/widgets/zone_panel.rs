use crate::report::format_distance;
use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn zone_color(zone: u8) -> Color {
    match zone {
        3 => Color::Green,
        2 => Color::Yellow,
        1 => Color::Cyan,
        _ => Color::DarkGray,
    }
}

fn zone_label(zone: u8) -> &'static str {
    match zone {
        3 => "ZONE 3 (closest)",
        2 => "ZONE 2",
        1 => "ZONE 1",
        _ => "OUTSIDE",
    }
}

/// Render the proximity zone panel
pub fn render_zone_panel(frame: &mut Frame, area: Rect, app: &App) {
    let snapshot = &app.snapshot;

    let block = Block::default()
        .title(" Proximity ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    // Zone band strip: outside to closest, the current band highlighted
    let mut band_spans = Vec::new();
    for zone in [0u8, 1, 2, 3] {
        let text = format!(" {} ", zone);
        let style = if zone == snapshot.current_zone {
            Style::default()
                .fg(Color::Black)
                .bg(zone_color(zone))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        band_spans.push(Span::styled(text, style));
        band_spans.push(Span::raw(" "));
    }

    let distance_str = snapshot
        .distance_m
        .map(format_distance)
        .unwrap_or_else(|| "--".to_string());

    let room_str = snapshot
        .strongest()
        .map(|b| b.identity.clone())
        .unwrap_or_else(|| "no beacon".to_string());

    let mut content = vec![
        Line::from(vec![
            Span::styled(
                zone_label(snapshot.current_zone),
                Style::default()
                    .fg(zone_color(snapshot.current_zone))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(format!("~{}", distance_str), Style::default().fg(Color::White)),
        ]),
        Line::from(band_spans),
        Line::from(vec![
            Span::styled("Progress: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("zone {}", snapshot.progress_zone)),
            Span::raw("   "),
            Span::styled("Tracking: ", Style::default().fg(Color::Yellow)),
            Span::raw(room_str),
        ]),
    ];

    if app.narration_enabled {
        let line = app
            .narration_line
            .as_deref()
            .unwrap_or("(nothing to narrate yet)");
        content.push(Line::from(vec![
            Span::styled("Guide: ", Style::default().fg(Color::Magenta)),
            Span::styled(line, Style::default().fg(Color::White)),
        ]));
    }

    frame.render_widget(Paragraph::new(content).block(block), area);
}
