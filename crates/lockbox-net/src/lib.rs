//! Raw byte passthrough over HTTP. Payloads are sent and returned untouched.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, protocol, or body read failure.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    /// The server answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Fetch and post raw bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_raw(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    async fn post_raw(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("lockbox"));
        headers
    }

    async fn finish(
        url: &str,
        sent: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Vec<u8>, TransportError> {
        let response = sent.map_err(|e| request_err(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|e| request_err(url, e))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self))]
    async fn get_raw(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let sent = self.client.get(url).headers(Self::headers()).send().await;
        Self::finish(url, sent).await
    }

    #[instrument(skip(self, body), fields(len = body.len()))]
    async fn post_raw(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, TransportError> {
        let sent = self
            .client
            .post(url)
            .headers(Self::headers())
            .body(body.to_vec())
            .send()
            .await;
        Self::finish(url, sent).await
    }
}

fn request_err(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
