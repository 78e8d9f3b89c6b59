//! Playback sync engine
//!
//! One poll cycle fetches the playback state and either refreshes the
//! current track, swaps in a new one, or, when the account has no active
//! device, tries to move playback to a device that can take it.

use std::time::Duration;

use crate::bus::{PollControl, SharedBus, UiEvent};
use crate::error::SessionError;
use crate::http::{ResponseConsumer, Session, SharedSession};
use crate::json;
use crate::model::{Endpoints, PlayingFlag, TrackSlots, TrackSnapshot};

use super::soft_auth;

/// Device takeovers attempted per cycle: the remembered device, then the
/// first listed one.
const MAX_FAILOVERS: u8 = 2;

enum Failover {
    /// A transfer was sent; fetch the playback state again.
    Refetch,
    /// Nothing to transfer to.
    NoDevice,
    /// Give up on this cycle.
    Abandon,
}

enum Listed {
    First(String),
    Empty,
    Unavailable,
}

pub struct PlaybackSync {
    session: SharedSession,
    bus: SharedBus,
    endpoints: Endpoints,
    playing: PlayingFlag,
    poll_interval: Duration,
    slots: TrackSlots,
    known_device: Option<String>,
}

impl PlaybackSync {
    pub fn new(
        session: SharedSession,
        bus: SharedBus,
        endpoints: Endpoints,
        playing: PlayingFlag,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session,
            bus,
            endpoints,
            playing,
            poll_interval,
            slots: TrackSlots::default(),
            known_device: None,
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> &TrackSnapshot {
        self.slots.current()
    }

    /// Poll until the retry ceiling is crossed. Each cycle starts on a wake
    /// signal or after the poll interval, and is skipped while polling is
    /// disabled.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let bus = self.bus.clone();
        let mut control = bus.subscribe_control();
        loop {
            tokio::select! {
                _ = bus.woken() => tracing::debug!("Poll woken early"),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            while *control.borrow_and_update() == PollControl::Disable {
                tracing::info!("Polling suspended until re-enabled");
                if control.changed().await.is_err() {
                    return Ok(());
                }
            }

            self.poll_cycle().await?;
        }
    }

    /// One fetch/decide/act pass under the session lock. Returns the event
    /// posted, if any. Only a fatal transport failure is an error.
    pub async fn poll_cycle(&mut self) -> Result<Option<UiEvent>, SessionError> {
        let session = self.session.clone();
        let mut session = session.lock().await;

        let mut token_retried = false;
        let mut failovers = 0;

        loop {
            let mut consumer = ResponseConsumer::accumulate(session.body_capacity());
            let result = session
                .execute(self.endpoints.current_playback(), &mut consumer)
                .await;
            let Some(status) = soft_auth(result, "poll")? else {
                return Ok(None);
            };

            match status {
                200 => {
                    let latest = match consumer.body().and_then(json::track_snapshot) {
                        Ok(latest) => latest,
                        Err(e) => {
                            tracing::warn!(error = %e, "Playback state unusable");
                            return Ok(None);
                        }
                    };
                    return Ok(Some(self.apply(latest)));
                }
                401 if !token_retried => {
                    token_retried = true;
                    session.invalidate_token();
                }
                204 if failovers < MAX_FAILOVERS => {
                    failovers += 1;
                    tracing::warn!(attempt = failovers, "No active device");
                    match self.failover(&mut session, failovers).await? {
                        Failover::Refetch => {}
                        Failover::NoDevice => {
                            tracing::error!("No device can take over playback");
                            self.bus.post(UiEvent::LastDeviceFailed);
                            self.bus.set_polling(PollControl::Disable);
                            return Ok(Some(UiEvent::LastDeviceFailed));
                        }
                        Failover::Abandon => return Ok(None),
                    }
                }
                status => {
                    tracing::warn!(status, body = ?consumer.body().map(String::from_utf8_lossy).ok(), "Playback poll failed");
                    return Ok(None);
                }
            }
        }
    }

    /// Publish `latest` as a refresh of the current track or as a new one.
    fn apply(&mut self, latest: TrackSnapshot) -> UiEvent {
        self.playing.set(latest.is_playing);
        if !latest.device.id.is_empty() {
            self.known_device = Some(latest.device.id.clone());
        }

        let event = if self.slots.current().same_track(&latest) {
            self.slots.refresh(latest);
            UiEvent::SameTrack
        } else {
            let track = self.slots.replace(latest);
            tracing::info!(
                title = %track.name,
                artists = %track.artist_line(),
                album = %track.album,
                "New track"
            );
            UiEvent::NewTrack
        };

        self.bus.publish_snapshot(self.slots.current());
        self.bus.post(event.clone());
        event
    }

    async fn failover(&mut self, session: &mut Session, attempt: u8) -> Result<Failover, SessionError> {
        let remembered = if attempt == 1 {
            self.known_device.clone()
        } else {
            None
        };
        let target = match remembered {
            Some(id) => id,
            None => match self.first_listed_device(session).await? {
                Listed::First(id) => {
                    self.known_device = Some(id.clone());
                    id
                }
                Listed::Empty => return Ok(Failover::NoDevice),
                Listed::Unavailable => return Ok(Failover::Abandon),
            },
        };

        tracing::warn!(device_id = %target, "Transferring playback");
        let mut consumer = ResponseConsumer::accumulate(session.body_capacity());
        let result = session.execute(self.endpoints.transfer(&target), &mut consumer).await;
        let Some(status) = soft_auth(result, "transfer")? else {
            return Ok(Failover::Abandon);
        };

        if matches!(status, 202 | 204) {
            tracing::info!(device_id = %target, "Playback transferred");
            self.bus.post(UiEvent::DeviceTransferred { device_id: target });
        } else {
            tracing::warn!(device_id = %target, status, "Transfer refused");
            self.bus.post(UiEvent::TransferFailed {
                device_id: target,
                status,
            });
        }
        Ok(Failover::Refetch)
    }

    /// First device the account lists. The list is published for the front
    /// end.
    async fn first_listed_device(&self, session: &mut Session) -> Result<Listed, SessionError> {
        let mut consumer = ResponseConsumer::accumulate(session.body_capacity());
        let result = session.execute(self.endpoints.devices(), &mut consumer).await;
        let Some(status) = soft_auth(result, "devices")? else {
            return Ok(Listed::Unavailable);
        };
        if status != 200 {
            tracing::warn!(status, "Device list query failed");
            return Ok(Listed::Unavailable);
        }

        let devices = match consumer.body().and_then(json::device_list) {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!(error = %e, "Device list unusable");
                return Ok(Listed::Unavailable);
            }
        };
        tracing::info!(count = devices.len(), names = %devices.display(), "Available devices");

        let listed = match devices.first() {
            Some(device) => Listed::First(device.id.clone()),
            None => Listed::Empty,
        };
        self.bus.publish_devices(devices);
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::NotificationBus;
    use crate::error::TransportError;
    use crate::http::mock::{self, Reply, RequestLog};

    const API: &str = "https://api.test/v1";

    fn playing(name: &str, progress_ms: u64, device: &str) -> String {
        format!(
            r#"{{"device":{{"id":"{device}","name":"Speaker","type":"Speaker","volume_percent":30,"is_active":true}},
               "progress_ms":{progress_ms},"is_playing":true,"currently_playing_type":"track",
               "item":{{"name":"{name}","duration_ms":200000,"album":{{"name":"Album"}},"artists":[{{"name":"Artist"}}]}}}}"#
        )
    }

    fn engine(replies: Vec<Reply>) -> (PlaybackSync, SharedBus, RequestLog) {
        let (session, log) = mock::session(2, replies);
        let bus = NotificationBus::shared();
        let sync = PlaybackSync::new(
            session.shared(),
            bus.clone(),
            Endpoints::new(API, "AR"),
            PlayingFlag::default(),
            Duration::from_secs(60),
        );
        (sync, bus, log)
    }

    fn player_url() -> String {
        format!("GET {API}/me/player?market=AR&additional_types=episode")
    }

    #[tokio::test]
    async fn identical_names_are_the_same_track() {
        let (mut sync, bus, _log) = engine(vec![
            Reply::json(200, &playing("Song", 1_000, "dev-1")),
            Reply::json(200, &playing("Song", 2_000, "dev-1")),
            Reply::chunked(200, &playing("Song", 3_000, "dev-1"), 7),
        ]);
        let snapshots = bus.subscribe_snapshot();

        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::NewTrack)));
        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::SameTrack)));
        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::SameTrack)));

        assert_eq!(sync.current().progress_ms, 3_000);
        assert_eq!(snapshots.borrow().progress_ms, 3_000);
        assert_eq!(*bus.subscribe_events().borrow(), Some(UiEvent::SameTrack));
    }

    #[tokio::test]
    async fn different_name_replaces_the_snapshot() {
        let (mut sync, _bus, _log) = engine(vec![
            Reply::json(200, &playing("One", 0, "dev-1")),
            Reply::json(200, &playing("Two", 0, "dev-1")),
        ]);

        sync.poll_cycle().await.unwrap();
        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::NewTrack)));
        assert_eq!(sync.current().name, "Two");
        assert!(sync.playing.get());
    }

    #[tokio::test]
    async fn remembered_device_takes_over() {
        let (mut sync, bus, log) = engine(vec![
            Reply::json(200, &playing("Song", 0, "dev-1")),
            Reply::empty(204),
            Reply::empty(204),
            Reply::json(200, &playing("Song", 500, "dev-1")),
        ]);
        let mut events = bus.subscribe_events();

        sync.poll_cycle().await.unwrap();
        events.borrow_and_update();

        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::SameTrack)));
        assert_eq!(bus.polling(), PollControl::Enable);
        assert_ne!(*events.borrow(), Some(UiEvent::LastDeviceFailed));

        let calls = mock::calls(&log);
        assert_eq!(
            calls[1..],
            [player_url(), format!("PUT {API}/me/player"), player_url()]
        );
        let transfer = log.lock().unwrap()[2].body.clone().unwrap();
        assert_eq!(transfer, r#"{"device_ids":["dev-1"],"play":false}"#);
    }

    #[tokio::test]
    async fn empty_device_list_is_the_last_failure() {
        let (mut sync, bus, log) = engine(vec![
            Reply::empty(204),
            Reply::json(200, r#"{"devices":[]}"#),
        ]);

        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::LastDeviceFailed)));

        assert_eq!(bus.polling(), PollControl::Disable);
        assert_eq!(*bus.subscribe_events().borrow(), Some(UiEvent::LastDeviceFailed));
        assert_eq!(
            mock::calls(&log),
            [player_url(), format!("GET {API}/me/player/devices")]
        );
    }

    #[tokio::test]
    async fn second_failover_uses_the_first_listed_device() {
        let (mut sync, bus, log) = engine(vec![
            Reply::json(200, &playing("Song", 0, "dev-1")),
            Reply::empty(204),
            Reply::empty(404),
            Reply::empty(204),
            Reply::json(200, r#"{"devices":[{"id":"dev-9","name":"Phone"},{"id":"dev-3","name":"TV"}]}"#),
            Reply::empty(202),
            Reply::json(200, &playing("Other", 0, "dev-9")),
        ]);
        let devices = bus.subscribe_devices();

        sync.poll_cycle().await.unwrap();
        assert_eq!(sync.poll_cycle().await, Ok(Some(UiEvent::NewTrack)));

        let bodies: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.body.clone())
            .collect();
        assert_eq!(
            bodies,
            [
                r#"{"device_ids":["dev-1"],"play":false}"#,
                r#"{"device_ids":["dev-9"],"play":false}"#
            ]
        );
        assert_eq!(devices.borrow().as_ref().unwrap().display(), "Phone\nTV");
        assert_eq!(sync.known_device.as_deref(), Some("dev-9"));
    }

    #[tokio::test]
    async fn third_no_device_answer_is_a_soft_failure() {
        let (mut sync, bus, _log) = engine(vec![
            Reply::json(200, &playing("Song", 0, "dev-1")),
            Reply::empty(204),
            Reply::empty(204),
            Reply::empty(204),
            Reply::json(200, r#"{"devices":[{"id":"dev-2","name":"Desk"}]}"#),
            Reply::empty(204),
            Reply::empty(204),
        ]);

        sync.poll_cycle().await.unwrap();
        assert_eq!(sync.poll_cycle().await, Ok(None));
        assert_eq!(bus.polling(), PollControl::Enable);
    }

    #[tokio::test]
    async fn unauthorized_poll_refreshes_once() {
        let (mut sync, _bus, log) = engine(vec![
            Reply::empty(401),
            Reply::json(200, r#"{"access_token":"token-1","expires_in":3600}"#),
            Reply::empty(401),
        ]);

        assert_eq!(sync.poll_cycle().await, Ok(None));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].url, "https://accounts.test/api/token");
        assert_eq!(log[2].authorization, "Bearer token-1");
    }

    #[tokio::test]
    async fn unexpected_status_posts_nothing() {
        let (mut sync, bus, _log) = engine(vec![Reply::json(500, "oops")]);
        assert_eq!(sync.poll_cycle().await, Ok(None));
        assert_eq!(*bus.subscribe_events().borrow(), None);
        assert!(sync.current().is_placeholder());
    }

    #[tokio::test]
    async fn fatal_transport_failure_ends_the_cycle() {
        let (mut sync, _bus, _log) = engine(vec![Reply::timeout(), Reply::timeout(), Reply::timeout()]);
        let err = sync.poll_cycle().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::RetriesExhausted {
                attempts: 3,
                last: TransportError::Timeout
            }
        );
    }

    #[tokio::test]
    async fn run_skips_cycles_while_disabled() {
        let (sync, bus, log) = engine(vec![Reply::json(200, &playing("Song", 0, "dev-1"))]);
        bus.set_polling(PollControl::Disable);
        bus.wake();
        let task = tokio::spawn(sync.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.lock().unwrap().is_empty());

        let mut snapshots = bus.subscribe_snapshot();
        bus.set_polling(PollControl::Enable);
        tokio::time::timeout(Duration::from_secs(1), snapshots.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshots.borrow().name, "Song");
        task.abort();
    }
}
