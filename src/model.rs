//! Model module - Playback state and data types
//!
//! - `types`: device records, name/uri lists, input events, UI page state
//! - `playback`: the double-buffered track snapshot and the playing flag
//! - `endpoints`: Web API request builders

mod endpoints;
mod playback;
mod types;

pub use endpoints::Endpoints;

pub use playback::{PlayingFlag, TrackSlots, TrackSnapshot};

pub use types::{
    DeviceInfo, DeviceList, Direction, InputEvent, NameUriList, Page, Press, UiState,
};
