//! Upstream completion API.
//!
//! The proxy never looks inside the request or the reply: bytes in, bytes
//! out, with the service's own credential attached.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;

/// The upstream could not be reached at all. An HTTP error status is not
/// an `UpstreamError`; it is relayed as an [`UpstreamReply`].
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Raw upstream response, relayed to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait CompletionUpstream: Send + Sync {
    async fn forward(&self, body: Bytes) -> Result<UpstreamReply, UpstreamError>;
}

pub struct HttpCompletionUpstream {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpCompletionUpstream {
    pub fn new(client: reqwest::Client, url: &str, api_key: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl CompletionUpstream for HttpCompletionUpstream {
    async fn forward(&self, body: Bytes) -> Result<UpstreamReply, UpstreamError> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}
