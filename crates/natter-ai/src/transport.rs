//! HTTP transport seam.
//!
//! The session only ever sees a status code and an incremental byte stream,
//! so tests can drive it with in-memory bodies.

use std::pin::Pin;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::request::ChatRequest;
use crate::{Error, Result};

/// Response body delivered chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Status line plus a not-yet-consumed body
pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn new(status: u16, body: ByteStream) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body
    pub async fn bytes(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.body.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    /// Turn a non-success response into [`Error::Status`], keeping the body text
    pub async fn into_error(self) -> Error {
        let status = self.status;
        match self.bytes().await {
            Ok(body) => Error::status(status, String::from_utf8_lossy(&body).trim()),
            Err(_) => Error::status(status, ""),
        }
    }
}

/// Executes a [`ChatRequest`] and hands back the response incrementally
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ChatRequest) -> Result<TransportResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, custom TLS roots)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ChatRequest) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .post(request.url)
            .headers(request.headers)
            .json(&request.body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let mut response = builder.send().await?;
        let status = response.status().as_u16();
        tracing::debug!(provider = %request.provider_id, status, streaming = request.streaming, "Chat response headers received");

        let body: ByteStream = Box::pin(stream! {
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => yield Ok(chunk.to_vec()),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(Error::Http(e));
                        break;
                    }
                }
            }
        });

        Ok(TransportResponse::new(status, body))
    }
}
