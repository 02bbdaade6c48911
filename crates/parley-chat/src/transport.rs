//! Upstream transport seam.
//!
//! The dispatcher talks to the upstream service only through
//! [`UpstreamTransport`], so tests can script responses and hosts can swap
//! the HTTP stack.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ChatError;
use crate::request::RequestCandidate;

/// Status line and body of an upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, truncated for log output.
    pub fn body_snippet(&self) -> String {
        const MAX: usize = 256;
        let text = String::from_utf8_lossy(&self.body);
        if text.chars().count() > MAX {
            let cut: String = text.chars().take(MAX).collect();
            format!("{}...", cut)
        } else {
            text.into_owned()
        }
    }
}

/// A call that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Sends one request candidate to the upstream service.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, candidate: &RequestCandidate) -> Result<RawResponse, TransportFailure>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::ClientInit(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn send(&self, candidate: &RequestCandidate) -> Result<RawResponse, TransportFailure> {
        let mut request = self
            .client
            .post(candidate.endpoint.as_str())
            .timeout(self.timeout)
            .json(&candidate.body);
        for (name, value) in &candidate.headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::Connection(err.to_string())
    }
}
