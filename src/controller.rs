//! Controller module - Engines and input handling
//!
//! - `sync`: playback sync engine (polling, track changes, device failover)
//! - `commands`: command dispatcher fed by the input queue
//! - `playlists`: playlist page fetch and selection
//! - `input`: key events mapped to encoder events and page navigation

mod commands;
mod input;
mod playlists;
mod sync;

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::bus::SharedBus;
use crate::error::SessionError;
use crate::model::{InputEvent, UiState};

pub use commands::CommandDispatcher;
pub use sync::PlaybackSync;

/// Front-end side of the controller: owns the page state and forwards
/// encoder events to the dispatcher.
#[derive(Clone)]
pub struct AppController {
    pub(crate) model: Arc<Mutex<UiState>>,
    pub(crate) dispatcher: CommandDispatcher,
    pub(crate) input: mpsc::Sender<InputEvent>,
    pub(crate) bus: SharedBus,
}

impl AppController {
    pub fn new(
        model: Arc<Mutex<UiState>>,
        dispatcher: CommandDispatcher,
        input: mpsc::Sender<InputEvent>,
        bus: SharedBus,
    ) -> Self {
        Self {
            model,
            dispatcher,
            input,
            bus,
        }
    }

    /// Record a fatal error from a background command; the main loop exits
    /// on it.
    pub(crate) async fn report_fatal(&self, err: SessionError) {
        tracing::error!(error = %err, "Fatal session error");
        self.model.lock().await.fatal = Some(err);
    }
}

/// Split the outcome of `Session::execute` into a status to act on, a
/// dropped request (`None`, the token could not be refreshed), or a fatal
/// error for the caller to propagate.
pub(crate) fn soft_auth(
    result: Result<u16, SessionError>,
    action: &'static str,
) -> Result<Option<u16>, SessionError> {
    match result {
        Ok(status) => Ok(Some(status)),
        Err(err) if !err.is_fatal() => {
            tracing::warn!(action, error = %err, "Request dropped, no valid token");
            Ok(None)
        }
        Err(fatal) => Err(fatal),
    }
}
