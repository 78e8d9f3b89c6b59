//! Notification bus between the engines and the front end.
//!
//! Every mailbox is a single-slot `watch` channel: a new value overwrites the
//! old one and a slow reader only ever sees the latest state. Results (events,
//! the published snapshot, the device list) and commands (poll enable and
//! disable, the early wake-up) travel on separate channels.

use std::sync::Arc;

use tokio::sync::{Notify, watch};

use crate::model::{DeviceList, TrackSnapshot};

/// Result posted by an engine for the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    NewTrack,
    SameTrack,
    /// No device could take over playback; polling is suspended.
    LastDeviceFailed,
    DeviceTransferred { device_id: String },
    TransferFailed { device_id: String, status: u16 },
    PlaylistsOk,
    PlaylistsEmpty,
    PlaylistsFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Enable,
    Disable,
}

pub struct NotificationBus {
    events: watch::Sender<Option<UiEvent>>,
    snapshot: watch::Sender<Arc<TrackSnapshot>>,
    devices: watch::Sender<Option<Arc<DeviceList>>>,
    control: watch::Sender<PollControl>,
    wake: Notify,
}

pub type SharedBus = Arc<NotificationBus>;

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            events: watch::Sender::new(None),
            snapshot: watch::Sender::new(Arc::default()),
            devices: watch::Sender::new(None),
            control: watch::Sender::new(PollControl::Enable),
            wake: Notify::new(),
        }
    }

    pub fn shared() -> SharedBus {
        Arc::new(Self::new())
    }

    pub fn post(&self, event: UiEvent) {
        tracing::debug!(?event, "Posting UI event");
        self.events.send_replace(Some(event));
    }

    pub fn publish_snapshot(&self, snapshot: &TrackSnapshot) {
        self.snapshot.send_replace(Arc::new(snapshot.clone()));
    }

    pub fn publish_devices(&self, devices: DeviceList) {
        self.devices.send_replace(Some(Arc::new(devices)));
    }

    pub fn set_polling(&self, control: PollControl) {
        tracing::info!(?control, "Polling control");
        self.control.send_replace(control);
    }

    pub fn polling(&self) -> PollControl {
        *self.control.borrow()
    }

    /// Wake the sync engine before its poll interval elapses. A wake with no
    /// waiter is remembered for the next wait.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub async fn woken(&self) {
        self.wake.notified().await;
    }

    pub fn subscribe_events(&self) -> watch::Receiver<Option<UiEvent>> {
        self.events.subscribe()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<TrackSnapshot>> {
        self.snapshot.subscribe()
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Option<Arc<DeviceList>>> {
        self.devices.subscribe()
    }

    pub fn subscribe_control(&self) -> watch::Receiver<PollControl> {
        self.control.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn latest_event_wins() {
        let bus = NotificationBus::new();
        let mut events = bus.subscribe_events();

        bus.post(UiEvent::NewTrack);
        bus.post(UiEvent::SameTrack);

        assert!(events.has_changed().unwrap());
        assert_eq!(*events.borrow_and_update(), Some(UiEvent::SameTrack));
        assert!(!events.has_changed().unwrap());
    }

    #[tokio::test]
    async fn wake_before_wait_is_not_lost() {
        let bus = NotificationBus::new();
        bus.wake();

        tokio::time::timeout(Duration::from_millis(100), bus.woken())
            .await
            .expect("stored wake-up");
    }

    #[test]
    fn polling_starts_enabled() {
        let bus = NotificationBus::new();
        assert_eq!(bus.polling(), PollControl::Enable);
        bus.set_polling(PollControl::Disable);
        assert_eq!(*bus.subscribe_control().borrow(), PollControl::Disable);
    }

    #[test]
    fn snapshot_readers_get_whole_copies() {
        let bus = NotificationBus::new();
        let reader = bus.subscribe_snapshot();
        let track = TrackSnapshot {
            name: "Song".to_string(),
            ..Default::default()
        };

        bus.publish_snapshot(&track);

        assert_eq!(reader.borrow().name, "Song");
    }
}
