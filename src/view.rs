//! View module - UI rendering
//!
//! Stands in for the device display. It is organized into submodules by
//! component type:
//!
//! - `utils`: Shared utility functions (formatting, scrollable lists)
//! - `layout`: Top bar (status and device)
//! - `content`: Now-playing details and the playlist page
//! - `progress`: Progress bar
//! - `overlays`: Modal notices

mod content;
mod layout;
mod overlays;
mod progress;
mod utils;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::bus::{PollControl, UiEvent};
use crate::model::{DeviceList, Page, TrackSnapshot, UiState};

/// Everything one frame needs, borrowed from the bus and the page state.
pub struct Screen<'a> {
    pub track: &'a TrackSnapshot,
    pub ui_state: &'a UiState,
    pub devices: Option<&'a DeviceList>,
    pub last_event: Option<&'a UiEvent>,
    pub polling: PollControl,
}

pub struct AppView;

impl AppView {
    pub fn render(frame: &mut Frame, screen: &Screen<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status + device
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Progress bar
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], &screen.ui_state.status, &screen.track.device);

        match (&screen.ui_state.page, &screen.ui_state.playlists) {
            (Page::Playlists, Some(playlists)) => {
                content::render_playlists(frame, chunks[1], playlists, screen.ui_state.playlist_selected)
            }
            _ => content::render_now_playing(
                frame,
                chunks[1],
                screen.track,
                screen.devices,
                screen.last_event,
            ),
        }

        progress::render_progress_bar(frame, chunks[2], screen.track, screen.polling);

        if screen.last_event == Some(&UiEvent::LastDeviceFailed) && screen.polling == PollControl::Disable {
            overlays::render_notice(
                frame,
                "No device",
                "No Spotify Connect device could take over playback. Start one and press e.",
            );
        }
    }
}
