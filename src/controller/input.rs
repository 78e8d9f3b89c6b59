//! Key event handling
//!
//! The keyboard stands in for the rotary encoder: Space is a short press,
//! `m` a medium press, `l` a long press, Right and Left are rotations. The
//! remaining keys drive the pages.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::bus::PollControl;
use crate::model::{Direction, InputEvent, Page, Press};

use super::AppController;

/// Encoder event for a key, if it is one of the encoder keys.
pub fn encoder_event(code: KeyCode) -> Option<InputEvent> {
    match code {
        KeyCode::Char(' ') => Some(InputEvent::Button(Press::Short)),
        KeyCode::Char('m') | KeyCode::Char('M') => Some(InputEvent::Button(Press::Medium)),
        KeyCode::Char('l') | KeyCode::Char('L') => Some(InputEvent::Button(Press::Long)),
        KeyCode::Right => Some(InputEvent::Rotate(Direction::Clockwise)),
        KeyCode::Left => Some(InputEvent::Rotate(Direction::CounterClockwise)),
        _ => None,
    }
}

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let mut model = self.model.lock().await;

        if model.page == Page::Playlists {
            match key.code {
                KeyCode::Up => {
                    model.move_selection_up();
                    return Ok(());
                }
                KeyCode::Down => {
                    model.move_selection_down();
                    return Ok(());
                }
                KeyCode::Enter => {
                    let selected = model.selected_uri();
                    model.close_playlists();
                    drop(model);
                    if let Some(uri) = selected {
                        self.spawn_play_context(uri);
                    }
                    return Ok(());
                }
                KeyCode::Esc => {
                    model.close_playlists();
                    return Ok(());
                }
                _ => {}
            }
        }

        if let Some(event) = encoder_event(key.code) {
            match event {
                // Menu presses never reach the player.
                InputEvent::Button(Press::Long) => {
                    model.status = "Loading playlists...".to_string();
                    drop(model);
                    self.spawn_open_playlists();
                }
                InputEvent::Button(Press::Medium) => model.close_playlists(),
                _ => {
                    drop(model);
                    // A full queue means the dispatcher is busy; the event is
                    // dropped like a missed encoder tick.
                    if let Err(e) = self.input.try_send(event) {
                        tracing::debug!(?event, error = %e, "Input queue full");
                    }
                }
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                model.should_quit = true;
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                model.status = "Polling enabled".to_string();
                self.bus.set_polling(PollControl::Enable);
                self.bus.wake();
            }
            _ => {}
        }
        Ok(())
    }

    fn spawn_open_playlists(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            match controller.dispatcher.fetch_playlists().await {
                Ok(Some(playlists)) => {
                    let mut model = controller.model.lock().await;
                    model.status.clear();
                    model.open_playlists(playlists);
                }
                Ok(None) => {
                    controller.model.lock().await.status.clear();
                }
                Err(e) => controller.report_fatal(e).await,
            }
        });
    }

    fn spawn_play_context(&self, uri: String) {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.dispatcher.play_context(&uri).await {
                controller.report_fatal(e).await;
            }
        });
    }
}
