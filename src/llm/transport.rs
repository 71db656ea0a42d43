// HTTP transport abstraction for backend clients
//
// Backends build URLs, headers, and JSON bodies; the transport only moves
// bytes. Keeping it behind a trait lets tests script exact status codes and
// bodies (HTTP 429 sequences, malformed replies) without a network.
//
// A non-2xx status is not a transport error: it comes back as an HttpReply
// and the backend classifies it. Only failures before a response arrives
// (connect, TLS, timeout, body read) are BackendError::Transport.

use crate::error::{BackendError, Result};
use crate::version;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Status and raw body of an HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body and return the response status and body
    ///
    /// # Errors
    /// - `BackendError::Transport` if no response was received
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: &Value,
    ) -> std::result::Result<HttpReply, BackendError>;
}

/// Production transport backed by reqwest
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(version::user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: &Value,
    ) -> std::result::Result<HttpReply, BackendError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpReply { status, body })
    }
}
