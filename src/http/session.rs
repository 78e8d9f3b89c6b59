use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use super::{ApiRequest, HttpRequest, ResponseConsumer, Transport};
use crate::auth::TokenManager;
use crate::error::{AuthError, SessionError, TransportError};
use crate::json;

/// The one session. Holding the lock is the only way to reach the network.
pub type SharedSession = Arc<Mutex<Session>>;

/// Transport failures tolerated before giving up. Reset by any completed
/// exchange.
#[derive(Debug)]
pub struct RetryPolicy {
    ceiling: u32,
    delay: Duration,
    failures: u32,
}

impl RetryPolicy {
    pub fn new(ceiling: u32, delay: Duration) -> Self {
        Self {
            ceiling,
            delay,
            failures: 0,
        }
    }

    fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.failures
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

pub struct Session {
    transport: Box<dyn Transport>,
    tokens: TokenManager,
    retry: RetryPolicy,
    body_capacity: usize,
    pending: Option<ApiRequest>,
    last_status: Option<u16>,
    last_error: Option<TransportError>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pending", &self.pending)
            .field("last_status", &self.last_status)
            .field("last_error", &self.last_error)
            .field("retry", &self.retry)
            .field("token_expires_at", &self.tokens.expires_at())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        transport: Box<dyn Transport>,
        tokens: TokenManager,
        retry: RetryPolicy,
        body_capacity: usize,
    ) -> Self {
        Self {
            transport,
            tokens,
            retry,
            body_capacity,
            pending: None,
            last_status: None,
            last_error: None,
        }
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn body_capacity(&self) -> usize {
        self.body_capacity
    }

    /// Refresh the bearer token if it is within the skew of expiring.
    ///
    /// The grant goes straight to the transport: a failed refresh is an
    /// `AuthError`, not a retried request, and the old token stays in place.
    pub async fn ensure_valid(&mut self) -> Result<(), AuthError> {
        if !self.tokens.needs_refresh(Utc::now()) {
            return Ok(());
        }
        tracing::info!(expired_at = ?self.tokens.expires_at(), "Refreshing access token");

        let request = self.tokens.refresh_request();
        let mut consumer = ResponseConsumer::accumulate(self.body_capacity);
        let status = self
            .transport
            .perform(&request, &mut consumer)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Token refresh transport failure"))?;
        if status != 200 {
            tracing::error!(status, "Token endpoint refused the refresh grant");
            return Err(AuthError::Status(status));
        }

        let grant = json::token_grant(consumer.body()?)
            .inspect_err(|e| tracing::error!(error = %e, "Token response unusable"))?;
        tracing::debug!(expires_in = grant.expires_in, "Access token refreshed");
        self.tokens.apply(grant, Utc::now());
        Ok(())
    }

    /// Force the next `ensure_valid` to refresh (the API answered 401).
    pub fn invalidate_token(&mut self) {
        tracing::debug!("Access token rejected, invalidating");
        self.tokens.invalidate();
    }

    /// Run one authenticated exchange, routing the body into `consumer`.
    ///
    /// Transport failures are retried after the configured delay until the
    /// ceiling is crossed. Status codes are returned as they are; callers
    /// decide what a 401 or a 204 means for them.
    pub async fn execute(
        &mut self,
        request: ApiRequest,
        consumer: &mut ResponseConsumer<'_>,
    ) -> Result<u16, SessionError> {
        self.ensure_valid().await?;

        let http = HttpRequest::with_bearer(&request, self.tokens.bearer().unwrap_or_default());
        self.pending = Some(request);

        loop {
            consumer.reset();
            match self.transport.perform(&http, consumer).await {
                Ok(status) => {
                    self.retry.reset();
                    self.last_status = Some(status);
                    self.last_error = None;
                    tracing::debug!(method = %http.method, url = %http.url, status, "Request complete");
                    return Ok(status);
                }
                Err(err) => {
                    let failures = self.retry.record_failure();
                    self.last_error = Some(err.clone());
                    tracing::error!(
                        method = %http.method,
                        url = %http.url,
                        failures,
                        ceiling = self.retry.ceiling,
                        error = %err,
                        "Transport failure"
                    );
                    if failures > self.retry.ceiling {
                        tracing::warn!(failures, "Retry ceiling crossed, restart required");
                        return Err(SessionError::RetriesExhausted {
                            attempts: failures,
                            last: err,
                        });
                    }
                    tokio::time::sleep(self.retry.delay).await;
                }
            }
        }
    }
}
