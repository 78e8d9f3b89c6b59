//! Progress bar rendering

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
};

use super::utils::format_duration;
use crate::bus::PollControl;
use crate::model::TrackSnapshot;

pub fn render_progress_bar(frame: &mut Frame, area: Rect, track: &TrackSnapshot, polling: PollControl) {
    let status_text = if track.is_placeholder() {
        " Nothing playing".to_string()
    } else if track.is_playing {
        format!(" ▶ {}", track.name)
    } else {
        format!(" ⏸  {}", track.name)
    };

    let time_str = format!(
        "{} / {}",
        format_duration(track.progress_ms),
        format_duration(track.duration_ms)
    );

    let progress_ratio = if track.duration_ms > 0 {
        (track.progress_ms as f64 / track.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let polling_info = match polling {
        PollControl::Enable => " Polling ",
        PollControl::Disable => " Polling off (e to resume) ",
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ", status_text))
                .title_bottom(Line::from(polling_info).right_aligned()),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio)
        .label(time_str);

    frame.render_widget(gauge, area);
}
