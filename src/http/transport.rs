use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::{HttpRequest, Method, ResponseConsumer};
use crate::error::TransportError;

/// Performs one HTTP exchange, streaming the body into `consumer` before
/// returning the status code.
#[async_trait]
pub trait Transport: Send {
    async fn perform(
        &mut self,
        request: &HttpRequest,
        consumer: &mut ResponseConsumer<'_>,
    ) -> Result<u16, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spotify-remote/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &mut self,
        request: &HttpRequest,
        consumer: &mut ResponseConsumer<'_>,
    ) -> Result<u16, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };
        let mut builder = builder.header(AUTHORIZATION, &request.authorization);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if request.method != Method::Get {
            // The player endpoints reject bodiless PUT/POST without a length.
            builder = builder.body(request.body.clone().unwrap_or_default());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        tracing::debug!(method = %request.method, url = %request.url, status, "HTTP response");

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            consumer.on_data(&chunk?);
        }
        Ok(status)
    }
}
