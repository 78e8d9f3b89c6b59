//! Scripted transport for exercising the engines without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{HttpRequest, ResponseConsumer, RetryPolicy, Session, Transport};
use crate::auth::{Credentials, TokenManager};
use crate::error::TransportError;
use crate::json::TokenGrant;

pub(crate) type RequestLog = Arc<Mutex<Vec<HttpRequest>>>;

pub(crate) enum Reply {
    Status(u16, Vec<Vec<u8>>),
    Fail(TransportError),
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Status(status, vec![body.as_bytes().to_vec()])
    }

    /// `body` delivered in pieces of `size` bytes.
    pub fn chunked(status: u16, body: &str, size: usize) -> Self {
        Reply::Status(status, body.as_bytes().chunks(size).map(<[u8]>::to_vec).collect())
    }

    pub fn empty(status: u16) -> Self {
        Reply::Status(status, Vec::new())
    }

    pub fn timeout() -> Self {
        Reply::Fail(TransportError::Timeout)
    }
}

pub(crate) struct ScriptedTransport {
    script: VecDeque<Reply>,
    log: RequestLog,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> (Self, RequestLog) {
        let log = RequestLog::default();
        let transport = Self {
            script: replies.into_iter().collect(),
            log: log.clone(),
        };
        (transport, log)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(
        &mut self,
        request: &HttpRequest,
        consumer: &mut ResponseConsumer<'_>,
    ) -> Result<u16, TransportError> {
        self.log.lock().unwrap().push(request.clone());
        match self.script.pop_front() {
            Some(Reply::Status(status, chunks)) => {
                for chunk in &chunks {
                    consumer.on_data(chunk);
                }
                Ok(status)
            }
            Some(Reply::Fail(err)) => Err(err),
            None => panic!("unscripted request: {} {}", request.method, request.url),
        }
    }
}

pub(crate) fn credentials() -> Credentials {
    Credentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
    }
}

/// Session whose token is valid for an hour, zero retry delay.
pub(crate) fn session(ceiling: u32, replies: impl IntoIterator<Item = Reply>) -> (Session, RequestLog) {
    let (transport, log) = ScriptedTransport::new(replies);
    let mut tokens = TokenManager::new(
        credentials(),
        "https://accounts.test/api/token",
        chrono::Duration::seconds(10),
    );
    tokens.apply(
        TokenGrant {
            access_token: "token-0".to_string(),
            expires_in: 3600,
        },
        Utc::now(),
    );
    let session = Session::new(
        Box::new(transport),
        tokens,
        RetryPolicy::new(ceiling, Duration::ZERO),
        4096,
    );
    (session, log)
}

/// Method and url of every request made so far.
pub(crate) fn calls(log: &RequestLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url))
        .collect()
}
