//! HTTP core: one shared session that serialises every Web API exchange.
//!
//! - `transport`: the network seam (`reqwest` in production)
//! - `consumer`: where response bytes go while a request is in flight
//! - `session`: token check, retry policy and the shared lock

mod consumer;
#[cfg(test)]
pub(crate) mod mock;
mod session;
mod transport;

use std::fmt;

pub use consumer::ResponseConsumer;
pub use session::{RetryPolicy, Session, SharedSession};
pub use transport::{ReqwestTransport, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        })
    }
}

/// An authenticated Web API call waiting for the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub method: Method,
    /// JSON body, if any.
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            body: None,
        }
    }

    pub fn put(url: impl Into<String>, body: Option<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Put,
            body,
        }
    }
}

/// Fully configured request as handed to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub authorization: String,
    pub content_type: Option<&'static str>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn with_bearer(request: &ApiRequest, token: &str) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
            authorization: format!("Bearer {token}"),
            content_type: request.body.as_ref().map(|_| "application/json"),
            body: request.body.clone(),
        }
    }
}
