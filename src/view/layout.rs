//! Top bar rendering

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::model::DeviceInfo;

pub fn render_top_bar(frame: &mut Frame, area: Rect, status: &str, device: &DeviceInfo) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let title = Paragraph::new(if status.is_empty() { "Spotify remote" } else { status })
        .block(Block::default().borders(Borders::ALL).title(" spotify-remote "));
    frame.render_widget(title, chunks[0]);

    let device_text = if device.id.is_empty() {
        "No device".to_string()
    } else {
        match device.volume_percent {
            Some(volume) => format!("🎵 {} ({}%)", device.name, volume),
            None => format!("🎵 {}", device.name),
        }
    };
    let device_widget = Paragraph::new(device_text)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(" Device "));
    frame.render_widget(device_widget, chunks[1]);
}
