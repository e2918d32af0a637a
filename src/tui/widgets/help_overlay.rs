use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Render the help overlay popup
pub fn render_help(frame: &mut Frame, area: Rect) {
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = 12.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let key_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  q      ", key_style), Span::raw("Quit")]),
        Line::from(vec![Span::styled("  ?      ", key_style), Span::raw("Toggle this help")]),
        Line::from(vec![Span::styled("  k / ↑  ", key_style), Span::raw("Scroll log towards oldest")]),
        Line::from(vec![Span::styled("  j / ↓  ", key_style), Span::raw("Scroll log towards newest")]),
        Line::from(vec![Span::styled("  n      ", key_style), Span::raw("Toggle guide narration")]),
        Line::from(vec![Span::styled("  r      ", key_style), Span::raw("Repeat current narration")]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press ESC or ? to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let popup = Paragraph::new(content).block(
        Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(popup, popup_area);
}
