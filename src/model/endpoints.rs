//! Web API request builders

use serde_json::json;

use crate::http::ApiRequest;

/// Builds the player and playlist requests against one API base url.
#[derive(Clone, Debug)]
pub struct Endpoints {
    base: String,
    market: String,
}

impl Endpoints {
    pub fn new(base: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            market: market.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Playback state, including podcast episodes.
    pub fn current_playback(&self) -> ApiRequest {
        ApiRequest::get(self.url(&format!(
            "/me/player?market={}&additional_types=episode",
            urlencoding::encode(&self.market)
        )))
    }

    pub fn devices(&self) -> ApiRequest {
        ApiRequest::get(self.url("/me/player/devices"))
    }

    /// Move playback to `device_id` without starting it.
    pub fn transfer(&self, device_id: &str) -> ApiRequest {
        let body = json!({ "device_ids": [device_id], "play": false });
        ApiRequest::put(self.url("/me/player"), Some(body.to_string()))
    }

    pub fn play(&self) -> ApiRequest {
        ApiRequest::put(self.url("/me/player/play"), None)
    }

    pub fn pause(&self) -> ApiRequest {
        ApiRequest::put(self.url("/me/player/pause"), None)
    }

    pub fn previous(&self) -> ApiRequest {
        ApiRequest::post(self.url("/me/player/previous"))
    }

    pub fn next(&self) -> ApiRequest {
        ApiRequest::post(self.url("/me/player/next"))
    }

    pub fn play_context(&self, context_uri: &str) -> ApiRequest {
        let body = json!({ "context_uri": context_uri });
        ApiRequest::put(self.url("/me/player/play"), Some(body.to_string()))
    }

    /// First page of the user's playlists.
    pub fn playlists(&self, limit: u32) -> ApiRequest {
        ApiRequest::get(self.url(&format!("/me/playlists?offset=0&limit={limit}")))
    }
}
