//! Main content area rendering

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::utils::{render_scrollable_list, truncate_string};
use crate::bus::UiEvent;
use crate::model::{DeviceList, NameUriList, TrackSnapshot};

pub fn render_now_playing(
    frame: &mut Frame,
    area: Rect,
    track: &TrackSnapshot,
    devices: Option<&DeviceList>,
    last_event: Option<&UiEvent>,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let width = chunks[0].width.saturating_sub(12) as usize;
    let lines = if track.is_placeholder() {
        vec![Line::from("Waiting for playback...")]
    } else {
        vec![
            Line::from(Span::styled(
                truncate_string(&track.name, width),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![
                Span::styled("Artists: ", Style::default().fg(Color::DarkGray)),
                Span::raw(truncate_string(&track.artist_line(), width)),
            ]),
            Line::from(vec![
                Span::styled("Album:   ", Style::default().fg(Color::DarkGray)),
                Span::raw(truncate_string(&track.album, width)),
            ]),
        ]
    };
    let now_playing = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Now Playing "));
    frame.render_widget(now_playing, chunks[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(chunks[1]);

    let items: Vec<ListItem> = match devices {
        Some(list) if list.is_empty() => vec![ListItem::new(Span::styled(
            "No devices",
            Style::default().fg(Color::DarkGray),
        ))],
        Some(list) => list
            .entries()
            .iter()
            .map(|d| {
                let marker = if d.is_active { "● " } else { "  " };
                ListItem::new(format!("{}{}", marker, d.name))
            })
            .collect(),
        None => Vec::new(),
    };
    let device_list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Devices "));
    frame.render_widget(device_list, side[0]);

    let event = Paragraph::new(last_event.map(describe_event).unwrap_or_default())
        .block(Block::default().borders(Borders::ALL).title(" Last event "));
    frame.render_widget(event, side[1]);
}

pub fn render_playlists(frame: &mut Frame, area: Rect, playlists: &NameUriList, selected: usize) {
    let width = area.width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = if playlists.is_empty() {
        vec![ListItem::new("No playlists")]
    } else {
        playlists
            .names()
            .map(|name| ListItem::new(truncate_string(name, width)))
            .collect()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Playlists ({}) - Enter to play, Esc to close ", playlists.len()));
    render_scrollable_list(frame, area, items, selected, block);
}

pub fn describe_event(event: &UiEvent) -> String {
    match event {
        UiEvent::NewTrack => "New track".to_string(),
        UiEvent::SameTrack => "Up to date".to_string(),
        UiEvent::LastDeviceFailed => "No device available".to_string(),
        UiEvent::DeviceTransferred { device_id } => format!("Playback moved to {device_id}"),
        UiEvent::TransferFailed { device_id, status } => {
            format!("Transfer to {device_id} failed ({status})")
        }
        UiEvent::PlaylistsOk => "Playlists loaded".to_string(),
        UiEvent::PlaylistsEmpty => "No playlists".to_string(),
        UiEvent::PlaylistsFailed => "Could not load playlists".to_string(),
    }
}
