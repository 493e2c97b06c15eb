//! HTTP Transport
//!
//! The one place providers and the location lookup touch the network.
//! `ReqwestTransport` is the real implementation.

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

/// Timeout for provider requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for reachability probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Transport-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid JSON body: {0}")]
    Decode(String),
}

/// Status and decoded body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// JSON body; `Null` when empty, a string when a failed request returned text
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Error message reported by the server, if any.
    pub fn message(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            body => body
                .get("message")
                .or_else(|| body.get("reason"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Minimal async HTTP interface.
pub trait HttpTransport: Send + Sync {
    /// GET `url` with query parameters and decode the JSON body.
    fn get_json<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(&'a str, String)],
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;

    /// Whether `url` answers at all.
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, bool>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { http })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, TransportError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_reqwest_error)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) if (200..300).contains(&status) => {
                    return Err(TransportError::Decode(e.to_string()))
                }
                Err(_) => Value::String(text),
            }
        };

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}

impl HttpTransport for ReqwestTransport {
    fn get_json<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(&'a str, String)],
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        Box::pin(self.get(url, query))
    }

    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.http.head(url).timeout(PROBE_TIMEOUT).send().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("Reachability probe of {} failed: {}", url, e);
                    false
                }
            }
        })
    }
}
