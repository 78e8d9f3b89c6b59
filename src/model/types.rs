//! Core type definitions for the application

use crate::error::{DecodeError, SessionError};
use crate::json::{self, ObjectSink};

/// Information about a Spotify Connect device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub volume_percent: Option<u8>,
    pub is_active: bool,
}

/// Devices reported by `/me/player/devices`, in API order, with a
/// newline-joined list of names for the selection menu.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceList {
    entries: Vec<DeviceInfo>,
    display: String,
}

impl DeviceList {
    pub fn push(&mut self, device: DeviceInfo) {
        if !self.display.is_empty() {
            self.display.push('\n');
        }
        self.display.push_str(&device.name);
        self.entries.push(device);
    }

    pub fn first(&self) -> Option<&DeviceInfo> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[DeviceInfo] {
        &self.entries
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Playlist names and context uris collected while the playlists page
/// streams in. `display` holds the names joined by `\n`, the format the
/// selection list renders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameUriList {
    uris: Vec<String>,
    display: String,
}

impl NameUriList {
    pub fn push(&mut self, name: &str, uri: String) {
        if !self.uris.is_empty() {
            self.display.push('\n');
        }
        self.display.push_str(name);
        self.uris.push(uri);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.display.split('\n').take(self.uris.len())
    }

    pub fn uri(&self, index: usize) -> Option<&str> {
        self.uris.get(index).map(String::as_str)
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

impl ObjectSink for NameUriList {
    fn accept(&mut self, object: &[u8]) -> Result<(), DecodeError> {
        let entry = json::playlist_entry(object)?;
        // Newlines would split one entry into two menu rows.
        let name = entry.name.replace('\n', " ");
        self.push(&name, entry.uri);
        Ok(())
    }

    fn clear(&mut self) {
        self.uris.clear();
        self.display.clear();
    }
}

/// Button press length as classified by the encoder driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Press {
    Short,
    Medium,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// Event delivered by the input driver through the bounded input queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Button(Press),
    Rotate(Direction),
}

/// Which page the front end is showing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Page {
    #[default]
    NowPlaying,
    Playlists,
}

/// UI state for the application
#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub page: Page,
    pub playlists: Option<NameUriList>,
    pub playlist_selected: usize,
    pub status: String,
    pub should_quit: bool,
    /// Set by a background command that crossed the retry ceiling.
    pub fatal: Option<SessionError>,
}

impl UiState {
    pub fn open_playlists(&mut self, playlists: NameUriList) {
        self.page = Page::Playlists;
        self.playlists = Some(playlists);
        self.playlist_selected = 0;
    }

    /// Leave the playlist page; the list is dropped with it.
    pub fn close_playlists(&mut self) {
        self.page = Page::NowPlaying;
        self.playlists = None;
        self.playlist_selected = 0;
    }

    pub fn move_selection_up(&mut self) {
        self.playlist_selected = self.playlist_selected.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        let len = self.playlists.as_ref().map_or(0, NameUriList::len);
        if self.playlist_selected + 1 < len {
            self.playlist_selected += 1;
        }
    }

    pub fn selected_uri(&self) -> Option<String> {
        self.playlists
            .as_ref()
            .and_then(|list| list.uri(self.playlist_selected))
            .map(str::to_owned)
    }
}
