//! Test doubles shared by unit tests.

use crate::client::{IdenaClient, RawResponse, Transport};
use crate::models::{ApiConfig, Config, FlipscanError, Result};
use reqwest::Url;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const TEST_BASE_URL: &str = "http://idena.test/api";

/// API config with no waiting and three attempts per request.
pub fn test_api_config() -> ApiConfig {
    ApiConfig {
        base_url: TEST_BASE_URL.to_string(),
        timeout_secs: 5,
        max_retries: 3,
        backoff_unit_ms: 0,
    }
}

/// Full config with zero delays, writing under `out_dir`.
pub fn test_config(out_dir: &std::path::Path) -> Config {
    let mut config = Config {
        api: test_api_config(),
        ..Default::default()
    };
    config.scan.page_delay_ms = 0;
    config.scan.item_delay_ms = 0;
    config.output.dir = out_dir.to_path_buf();
    config
}

pub fn scripted_client(transport: ScriptedTransport) -> IdenaClient<ScriptedTransport> {
    IdenaClient::with_transport(transport, &test_api_config()).unwrap()
}

/// Transport answering from per-path queues.
///
/// Paths are relative to the API base (`/Epoch/5/Flips`). Each request pops
/// the next scripted answer; an empty queue answers with a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<RawResponse>>>>,
    calls: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_raw(&self, path: &str, response: RawResponse) {
        self.push(path, Ok(response));
    }

    pub fn push_json(&self, path: &str, body: Value) {
        self.push_raw(path, RawResponse::ok(body.to_string()));
    }

    pub fn push_status(&self, path: &str, status: u16) {
        self.push_raw(
            path,
            RawResponse {
                status,
                body: String::new(),
            },
        );
    }

    pub fn push_network_error(&self, path: &str) {
        self.push(
            path,
            Err(FlipscanError::Network("connection reset by peer".into())),
        );
    }

    fn push(&self, path: &str, response: Result<RawResponse>) {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| relative_path(u) == path)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(url.clone());
        let path = relative_path(url);
        self.routes
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(FlipscanError::Network(format!("no scripted response for {path}"))))
    }
}

fn relative_path(url: &Url) -> String {
    url.path().trim_start_matches("/api").to_string()
}

/// Split `items` into envelopes of `page_size`, chained by tokens.
///
/// Always returns at least one (possibly empty) page.
pub fn paged_envelopes(items: Vec<Value>, page_size: usize) -> Vec<Value> {
    let chunks: Vec<Vec<Value>> = if items.is_empty() {
        vec![Vec::new()]
    } else {
        items.chunks(page_size).map(<[Value]>::to_vec).collect()
    };
    let last = chunks.len() - 1;

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            if i == last {
                json!({ "result": chunk })
            } else {
                json!({ "result": chunk, "continuationToken": format!("page-{}", i + 2) })
            }
        })
        .collect()
}

/// Script a paginated endpoint.
pub fn push_pages(transport: &ScriptedTransport, path: &str, items: Vec<Value>, page_size: usize) {
    for page in paged_envelopes(items, page_size) {
        transport.push_json(path, page);
    }
}
