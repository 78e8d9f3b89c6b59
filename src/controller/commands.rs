//! Command dispatcher
//!
//! Turns encoder events into player commands. Toggle is optimistic: it
//! targets the opposite of the last known state and corrects itself once if
//! the API says that state was stale.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::bus::SharedBus;
use crate::error::SessionError;
use crate::http::{ApiRequest, ResponseConsumer, SharedSession};
use crate::model::{Direction, Endpoints, InputEvent, PlayingFlag, Press};

use super::soft_auth;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Play,
    Pause,
}

impl Toggle {
    fn opposite(self) -> Self {
        match self {
            Toggle::Play => Toggle::Pause,
            Toggle::Pause => Toggle::Play,
        }
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    pub(crate) session: SharedSession,
    pub(crate) bus: SharedBus,
    pub(crate) endpoints: Endpoints,
    playing: PlayingFlag,
    settle_delay: Duration,
    rotate_debounce: Duration,
    pub(crate) playlist_limit: u32,
    pub(crate) object_capacity: usize,
}

impl CommandDispatcher {
    pub fn new(session: SharedSession, bus: SharedBus, endpoints: Endpoints, playing: PlayingFlag) -> Self {
        Self {
            session,
            bus,
            endpoints,
            playing,
            settle_delay: Duration::ZERO,
            rotate_debounce: Duration::ZERO,
            playlist_limit: 50,
            object_capacity: 8192,
        }
    }

    pub fn with_delays(mut self, settle_delay: Duration, rotate_debounce: Duration) -> Self {
        self.settle_delay = settle_delay;
        self.rotate_debounce = rotate_debounce;
        self
    }

    pub fn with_playlists(mut self, limit: u32, object_capacity: usize) -> Self {
        self.playlist_limit = limit;
        self.object_capacity = object_capacity;
        self
    }

    fn toggle_request(&self, target: Toggle) -> ApiRequest {
        match target {
            Toggle::Play => self.endpoints.play(),
            Toggle::Pause => self.endpoints.pause(),
        }
    }

    /// Play if paused, pause if playing. A 403 means our idea of the state was
    /// wrong, so the opposite endpoint is tried once.
    pub async fn toggle(&self) -> Result<(), SessionError> {
        let mut target = if self.playing.get() {
            Toggle::Pause
        } else {
            Toggle::Play
        };
        let mut session = self.session.lock().await;
        let mut corrected = false;

        loop {
            let mut consumer = ResponseConsumer::accumulate(session.body_capacity());
            let result = session.execute(self.toggle_request(target), &mut consumer).await;
            let Some(status) = soft_auth(result, "toggle")? else {
                return Ok(());
            };

            match status {
                403 if !corrected => {
                    corrected = true;
                    target = target.opposite();
                    tracing::debug!(?target, "Playback state was stale, retrying");
                }
                200..=299 => {
                    self.playing.set(target == Toggle::Play);
                    tracing::info!(?target, "Toggled playback");
                    return Ok(());
                }
                status => {
                    tracing::warn!(?target, status, "Toggle failed");
                    return Ok(());
                }
            }
        }
    }

    /// Skip, then wake the sync engine once the player has had time to
    /// settle on the new track.
    pub async fn skip(&self, direction: Direction) -> Result<(), SessionError> {
        let request = match direction {
            Direction::Clockwise => self.endpoints.next(),
            Direction::CounterClockwise => self.endpoints.previous(),
        };
        {
            let mut session = self.session.lock().await;
            let mut consumer = ResponseConsumer::accumulate(session.body_capacity());
            let result = session.execute(request, &mut consumer).await;
            let Some(status) = soft_auth(result, "skip")? else {
                return Ok(());
            };
            if !(200..300).contains(&status) {
                tracing::warn!(?direction, status, "Skip failed");
            }
        }

        tokio::time::sleep(self.settle_delay).await;
        self.bus.wake();
        Ok(())
    }

    pub async fn handle(&self, event: InputEvent) -> Result<(), SessionError> {
        tracing::debug!(?event, "Input event");
        match event {
            InputEvent::Button(Press::Short) => self.toggle().await,
            InputEvent::Rotate(direction) => self.skip(direction).await,
            // Medium and long presses drive the menus, not the player.
            InputEvent::Button(_) => Ok(()),
        }
    }

    /// Consume the input queue until it closes or a command hits the retry
    /// ceiling. Rotations that pile up while a skip is in flight are dropped.
    pub async fn run(self, mut input: mpsc::Receiver<InputEvent>) -> Result<(), SessionError> {
        let mut held = None;
        loop {
            let event = match held.take() {
                Some(event) => event,
                None => match input.recv().await {
                    Some(event) => event,
                    None => return Ok(()),
                },
            };

            self.handle(event).await?;

            if let InputEvent::Rotate(_) = event {
                tokio::time::sleep(self.rotate_debounce).await;
                let mut dropped = 0;
                while let Ok(queued) = input.try_recv() {
                    if let InputEvent::Rotate(_) = queued {
                        dropped += 1;
                    } else {
                        held = Some(queued);
                        break;
                    }
                }
                if dropped > 0 {
                    tracing::debug!(dropped, "Discarded queued rotations");
                }
            }
        }
    }
}
