//! HTTP transport seam.
//!
//! `IdenaClient` only needs "GET this URL, give me status and body". Keeping
//! that behind a trait lets scans be driven by scripted responses in tests.

use crate::models::{FlipscanError, Result};
use reqwest::Url;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single GET round-trip.
///
/// Implementations report connection problems as `FlipscanError::Network`
/// and timeouts as `FlipscanError::Timeout`; any HTTP status is a response.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, url: &Url) -> Result<RawResponse>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("flipscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FlipscanError::Network(format!("building HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FlipscanError::Timeout(self.timeout)
            } else {
                FlipscanError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FlipscanError::Timeout(self.timeout)
            } else {
                FlipscanError::Network(format!("reading body: {e}"))
            }
        })?;

        Ok(RawResponse { status, body })
    }
}
