//! Refresh-token credentials and the bearer token they buy.
//!
//! The remote never runs an interactive OAuth flow. It holds a long-lived
//! refresh token and trades it for a short-lived access token whenever the
//! current one is about to lapse.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};

use crate::http::{HttpRequest, Method};
use crate::json::TokenGrant;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MAX_LIFETIME_SECS: u64 = 7 * 24 * 3600;

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn basic_authorization(&self) -> String {
        let pair = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(pair))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Bearer token and expiry. Lives inside the session, so every method runs
/// with the session lock held.
#[derive(Debug)]
pub struct TokenManager {
    credentials: Credentials,
    token_url: String,
    skew: Duration,
    token: Option<AccessToken>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, token_url: impl Into<String>, skew: Duration) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            skew,
            token: None,
        }
    }

    /// True iff `now >= expiry - skew`, or no token was ever granted.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match &self.token {
            Some(token) => now >= token.expires_at - self.skew,
            None => true,
        }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.value.as_str())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.as_ref().map(|t| t.expires_at)
    }

    /// The form-encoded refresh grant.
    pub fn refresh_request(&self) -> HttpRequest {
        HttpRequest {
            method: Method::Post,
            url: self.token_url.clone(),
            authorization: self.credentials.basic_authorization(),
            content_type: Some(FORM_CONTENT_TYPE),
            body: Some(format!(
                "grant_type=refresh_token&refresh_token={}",
                urlencoding::encode(&self.credentials.refresh_token)
            )),
        }
    }

    pub fn apply(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        let lifetime = Duration::seconds(grant.expires_in.min(MAX_LIFETIME_SECS) as i64);
        self.token = Some(AccessToken {
            value: grant.access_token,
            expires_at: now + lifetime,
        });
    }

    /// Mark the current token expired; the next check refreshes it. The
    /// stale value is kept for logging and until a new grant replaces it.
    pub fn invalidate(&mut self) {
        if let Some(token) = &mut self.token {
            token.expires_at = DateTime::<Utc>::MIN_UTC + self.skew;
        }
    }
}
