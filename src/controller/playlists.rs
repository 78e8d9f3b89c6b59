//! Playlist page: streamed listing and context playback

use crate::bus::UiEvent;
use crate::error::SessionError;
use crate::http::ResponseConsumer;
use crate::json::StreamingArrayDecoder;
use crate::model::NameUriList;

use super::{CommandDispatcher, soft_auth};

impl CommandDispatcher {
    /// Stream the first page of playlists into a fresh list. Posts
    /// `PlaylistsOk`, `PlaylistsEmpty` or `PlaylistsFailed`; the list is only
    /// returned when it holds at least one entry.
    pub async fn fetch_playlists(&self) -> Result<Option<NameUriList>, SessionError> {
        let mut playlists = NameUriList::default();
        let request = self.endpoints.playlists(self.playlist_limit);

        let outcome = {
            let mut session = self.session.lock().await;
            let decoder = StreamingArrayDecoder::items(self.object_capacity);
            let mut consumer = ResponseConsumer::stream_array(decoder, &mut playlists);
            let result = session.execute(request, &mut consumer).await;
            match soft_auth(result, "playlists")? {
                Some(200) => consumer.array_outcome(),
                Some(status) => {
                    tracing::warn!(status, "Playlist query failed");
                    self.bus.post(UiEvent::PlaylistsFailed);
                    return Ok(None);
                }
                None => {
                    self.bus.post(UiEvent::PlaylistsFailed);
                    return Ok(None);
                }
            }
        };

        match outcome {
            Ok(outcome) if outcome.empty => {
                tracing::info!("No playlists");
                self.bus.post(UiEvent::PlaylistsEmpty);
                Ok(None)
            }
            Ok(outcome) => {
                tracing::info!(count = outcome.objects, "Playlists loaded");
                tracing::debug!(names = %playlists.display(), "Playlist menu");
                self.bus.post(UiEvent::PlaylistsOk);
                Ok(Some(playlists))
            }
            Err(e) => {
                // One bad entry spoils the page.
                tracing::warn!(error = %e, kept = playlists.len(), "Playlist listing aborted");
                self.bus.post(UiEvent::PlaylistsFailed);
                Ok(None)
            }
        }
    }

    /// Start playing the context `uri`.
    pub async fn play_context(&self, uri: &str) -> Result<bool, SessionError> {
        let mut session = self.session.lock().await;
        let mut consumer = ResponseConsumer::accumulate(session.body_capacity());
        let result = session
            .execute(self.endpoints.play_context(uri), &mut consumer)
            .await;
        let Some(status) = soft_auth(result, "play context")? else {
            return Ok(false);
        };
        if !(200..300).contains(&status) {
            tracing::warn!(uri, status, "Could not start playlist");
            return Ok(false);
        }
        tracing::info!(uri, "Playing playlist");
        drop(session);
        self.bus.wake();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{NotificationBus, SharedBus};
    use crate::http::mock::{self, Reply, RequestLog};
    use crate::model::{Endpoints, PlayingFlag};

    const API: &str = "https://api.test/v1";

    fn dispatcher(replies: Vec<Reply>) -> (CommandDispatcher, SharedBus, RequestLog) {
        let (session, log) = mock::session(2, replies);
        let bus = NotificationBus::shared();
        let dispatcher = CommandDispatcher::new(
            session.shared(),
            bus.clone(),
            Endpoints::new(API, "AR"),
            PlayingFlag::default(),
        )
        .with_playlists(20, 256);
        (dispatcher, bus, log)
    }

    const PAGE: &str = r#"{"href":"https://api.test/v1/me/playlists","items":[
        {"collaborative":false,"name":"Road {trip}","owner":{"id":"me"},"uri":"spotify:playlist:1"},
        {"name":"Focus","tracks":{"total":12},"uri":"spotify:playlist:2"}
    ],"limit":20,"next":null,"offset":0,"total":2}"#;

    #[tokio::test]
    async fn streamed_page_becomes_a_menu() {
        let (dispatcher, bus, log) = dispatcher(vec![Reply::chunked(200, PAGE, 5)]);

        let list = dispatcher.fetch_playlists().await.unwrap().unwrap();

        assert_eq!(list.display(), "Road {trip}\nFocus");
        assert_eq!(list.uri(1), Some("spotify:playlist:2"));
        assert_eq!(*bus.subscribe_events().borrow(), Some(UiEvent::PlaylistsOk));
        assert_eq!(mock::calls(&log), [format!("GET {API}/me/playlists?offset=0&limit=20")]);
    }

    #[tokio::test]
    async fn empty_page_posts_empty() {
        let (dispatcher, bus, _log) = dispatcher(vec![Reply::json(200, r#"{"items" : [ ],"total":0}"#)]);

        assert_eq!(dispatcher.fetch_playlists().await, Ok(None));
        assert_eq!(*bus.subscribe_events().borrow(), Some(UiEvent::PlaylistsEmpty));
    }

    #[tokio::test]
    async fn entry_without_uri_fails_the_page() {
        let page = PAGE.replace(r#","uri":"spotify:playlist:2""#, "");
        let (dispatcher, bus, _log) = dispatcher(vec![Reply::json(200, &page)]);

        assert_eq!(dispatcher.fetch_playlists().await, Ok(None));
        assert_eq!(*bus.subscribe_events().borrow(), Some(UiEvent::PlaylistsFailed));
    }

    #[tokio::test]
    async fn truncated_listing_fails_the_page() {
        let (dispatcher, bus, _log) = dispatcher(vec![Reply::json(200, &PAGE[..PAGE.len() / 2])]);

        assert_eq!(dispatcher.fetch_playlists().await, Ok(None));
        assert_eq!(*bus.subscribe_events().borrow(), Some(UiEvent::PlaylistsFailed));
    }

    #[tokio::test]
    async fn selecting_an_entry_plays_its_context() {
        let (dispatcher, bus, log) = dispatcher(vec![Reply::empty(204)]);

        assert_eq!(dispatcher.play_context("spotify:playlist:2").await, Ok(true));

        let sent = log.lock().unwrap()[0].clone();
        assert_eq!(sent.url, format!("{API}/me/player/play"));
        assert_eq!(sent.body.as_deref(), Some(r#"{"context_uri":"spotify:playlist:2"}"#));
        tokio::time::timeout(std::time::Duration::from_millis(100), bus.woken())
            .await
            .unwrap();
    }
}
