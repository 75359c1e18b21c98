//! Retrying client for the Idena public API.
//!
//! Every endpoint answers with `{ result, continuationToken?, error? }`.
//! The client turns that envelope into either a typed [`Envelope`] or a
//! classified error:
//! - HTTP 429, 5xx, connection failures, timeouts → transient, retried with
//!   linear backoff (`backoff_unit * attempt`)
//! - `error.message` in the body, other 4xx, unreadable JSON → fatal, returned
//!   immediately

use crate::client::endpoints;
use crate::client::paginator::Paginator;
use crate::client::throttle::{PauseReason, Throttle};
use crate::client::transport::{HttpTransport, RawResponse, Transport};
use crate::models::{ApiConfig, ApiError, Envelope, Epoch, FlipscanError, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Retrying Idena API client.
pub struct IdenaClient<T = HttpTransport> {
    transport: T,
    base_url: String,
    max_retries: u32,
    backoff_unit: Duration,
    throttle: Throttle,
}

impl IdenaClient<HttpTransport> {
    /// Build a client talking HTTP to `api.base_url`.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let transport = HttpTransport::new(api.timeout())?;
        Self::with_transport(transport, api)
    }
}

impl<T: Transport> IdenaClient<T> {
    /// Build a client over any transport.
    pub fn with_transport(transport: T, api: &ApiConfig) -> Result<Self> {
        let base_url = api.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| FlipscanError::InvalidInput(format!("base URL {base_url}: {e}")))?;
        if api.max_retries == 0 {
            return Err(FlipscanError::InvalidInput(
                "max_retries must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            transport,
            base_url,
            max_retries: api.max_retries,
            backoff_unit: api.backoff_unit(),
            throttle: Throttle::new(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the throttle (pacing and request counters).
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Absolute URL for `path` with query `params`.
    pub fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| FlipscanError::InvalidInput(format!("request path {path}: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// GET `path` and validate the envelope, retrying transient failures.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Envelope> {
        let url = self.url(path, params)?;
        let mut last_error: Option<FlipscanError> = None;

        for attempt in 1..=self.max_retries {
            match self.attempt(&url, path).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_retryable() => {
                    debug!(
                        url = %url,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Transient failure"
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        self.throttle
                            .pause(self.backoff_unit * attempt, PauseReason::Backoff)
                            .await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ApiError::MaxRetriesExceeded {
            attempts: self.max_retries,
            url: url.to_string(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
        .into())
    }

    async fn attempt(&self, url: &Url, path: &str) -> Result<Envelope> {
        let response = match self.transport.get(url).await {
            Ok(r) => r,
            Err(e) => {
                self.throttle.record_response(None);
                return Err(e);
            }
        };
        self.throttle.record_response(Some(response.status));

        if response.status == 429 {
            return Err(FlipscanError::RateLimited);
        }
        if response.status >= 500 {
            return Err(FlipscanError::ServerStatus(response.status));
        }
        if !response.is_success() {
            return Err(status_error(&response, url, path));
        }

        let envelope: Envelope = serde_json::from_str(&response.body)
            .map_err(|e| FlipscanError::schema(path, format!("invalid JSON envelope: {e}")))?;

        if let Some(message) = envelope.error_message() {
            return Err(ApiError::Remote {
                path: path.to_string(),
                message: message.to_string(),
            }
            .into());
        }

        Ok(envelope)
    }

    /// Lazily page through `path` with `limit=page_size`.
    pub fn paginate<I: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        page_size: u32,
        page_delay: Duration,
    ) -> Paginator<'_, T, I> {
        Paginator::new(self, path.into(), page_size, page_delay)
    }

    /// Latest (possibly still running) epoch number from `/Epoch/Last`.
    pub async fn latest_epoch(&self) -> Result<Epoch> {
        const PATH: &str = endpoints::LAST_EPOCH;
        let envelope = self.get(PATH, &[]).await?;

        match envelope.result {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::Object(map)) => ["epoch", "Epoch", "number", "Number"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_u64)),
            _ => None,
        }
        .ok_or_else(|| FlipscanError::schema(PATH, "result carries no epoch number"))
    }

    /// Use `requested` when non-zero, otherwise the last finished epoch.
    pub async fn resolve_epoch(&self, requested: Option<Epoch>) -> Result<Epoch> {
        match requested {
            Some(epoch) if epoch > 0 => Ok(epoch),
            _ => {
                let latest = self.latest_epoch().await?;
                let epoch = latest.saturating_sub(1);
                info!(latest, epoch, "Resolved last finished epoch");
                Ok(epoch)
            }
        }
    }
}

// 4xx other than 429: prefer the service's own message when it sent one.
fn status_error(response: &RawResponse, url: &Url, path: &str) -> FlipscanError {
    let message = serde_json::from_str::<Envelope>(&response.body)
        .ok()
        .and_then(|env| env.error_message().map(str::to_string));

    match message {
        Some(message) => ApiError::Remote {
            path: path.to_string(),
            message,
        }
        .into(),
        None => ApiError::Status {
            status: response.status,
            url: url.to_string(),
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, test_api_config};
    use serde_json::json;

    fn client(transport: ScriptedTransport) -> IdenaClient<ScriptedTransport> {
        IdenaClient::with_transport(transport, &test_api_config()).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_envelope() {
        let transport = ScriptedTransport::new();
        transport.push_json("/Flip/bafy1", json!({"result": {"author": "0xA"}}));

        let client = client(transport);
        let env = client.get("/Flip/bafy1", &[]).await.unwrap();
        assert_eq!(env.result.unwrap()["author"], "0xA");
        assert_eq!(client.throttle().stats().total_requests, 1);
    }

    #[tokio::test]
    async fn test_retries_429_then_succeeds() {
        let transport = ScriptedTransport::new();
        transport.push_status("/Epoch/Last", 429);
        transport.push_network_error("/Epoch/Last");
        transport.push_json("/Epoch/Last", json!({"result": {"epoch": 171}}));

        let client = client(transport);
        assert_eq!(client.latest_epoch().await.unwrap(), 171);

        let stats = client.throttle().stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_429s, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_wrap_last_cause() {
        let transport = ScriptedTransport::new();
        for _ in 0..3 {
            transport.push_status("/Epoch/Last", 503);
        }

        let client = client(transport);
        let err = client.get("/Epoch/Last", &[]).await.unwrap_err();
        match err {
            FlipscanError::Api(ApiError::MaxRetriesExceeded {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_envelope_error_is_fatal_without_retry() {
        let transport = ScriptedTransport::new();
        transport.push_json("/Flip/bad", json!({"error": {"message": "flip not found"}}));
        transport.push_json("/Flip/bad", json!({"result": {}}));

        let client = client(transport);
        let err = client.get("/Flip/bad", &[]).await.unwrap_err();
        assert!(matches!(err, FlipscanError::Api(ApiError::Remote { .. })));
        assert!(err.to_string().contains("flip not found"));
        assert_eq!(client.throttle().stats().total_requests, 1);
    }

    #[tokio::test]
    async fn test_client_error_status_is_fatal() {
        let transport = ScriptedTransport::new();
        transport.push_status("/Epoch/x/Flips", 400);

        let client = client(transport);
        let err = client.get("/Epoch/x/Flips", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            FlipscanError::Api(ApiError::Status { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_is_schema_violation() {
        let transport = ScriptedTransport::new();
        transport.push_raw("/Epoch/Last", RawResponse::ok("<html>oops</html>"));

        let client = client(transport);
        let err = client.get("/Epoch/Last", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            FlipscanError::Api(ApiError::UnexpectedSchema { .. })
        ));
    }

    #[tokio::test]
    async fn test_latest_epoch_shapes() {
        let transport = ScriptedTransport::new();
        transport.push_json("/Epoch/Last", json!({"result": 42}));
        transport.push_json("/Epoch/Last", json!({"result": {"Number": 43}}));
        transport.push_json("/Epoch/Last", json!({"result": "soon"}));

        let client = client(transport);
        assert_eq!(client.latest_epoch().await.unwrap(), 42);
        assert_eq!(client.latest_epoch().await.unwrap(), 43);
        assert!(client.latest_epoch().await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_epoch() {
        let transport = ScriptedTransport::new();
        transport.push_json("/Epoch/Last", json!({"result": {"epoch": 170}}));
        transport.push_json("/Epoch/Last", json!({"result": {"epoch": 0}}));

        let client = client(transport);
        assert_eq!(client.resolve_epoch(Some(120)).await.unwrap(), 120);
        assert_eq!(client.resolve_epoch(Some(0)).await.unwrap(), 169);
        assert_eq!(client.resolve_epoch(None).await.unwrap(), 0);
    }

    #[test]
    fn test_url_building() {
        let client = client(ScriptedTransport::new());
        let url = client
            .url(
                "/Epoch/5/Flips",
                &[("limit", "100".into()), ("continuationToken", "a+b".into())],
            )
            .unwrap();
        assert_eq!(url.path(), "/api/Epoch/5/Flips");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("limit".to_string(), "100".to_string()),
                ("continuationToken".to_string(), "a+b".to_string())
            ]
        );

        let bare = client.url("/Epoch/Last", &[]).unwrap();
        assert_eq!(bare.query(), None);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut api = test_api_config();
        api.max_retries = 0;
        assert!(IdenaClient::with_transport(ScriptedTransport::new(), &api).is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_over_http() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/Epoch/Last"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/Epoch/Last"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": {"epoch": 99}})),
            )
            .mount(&server)
            .await;

        let mut api = test_api_config();
        api.base_url = format!("{}/api", server.uri());
        let client = IdenaClient::from_config(&api).unwrap();

        assert_eq!(client.resolve_epoch(None).await.unwrap(), 98);
        assert_eq!(client.throttle().stats().total_429s, 1);
    }
}
