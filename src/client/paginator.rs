//! Continuation-token pagination.
//!
//! A [`Paginator`] walks one listing endpoint page by page and hands out
//! items in server order. It is lazy (a page is fetched only when the buffer
//! runs dry), finite (an absent or empty token ends it) and not restartable
//! (once finished or failed it only ever yields `None`).

use crate::client::idena_client::IdenaClient;
use crate::client::throttle::PauseReason;
use crate::client::transport::Transport;
use crate::models::{FlipscanError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    NotStarted,
    MorePages,
    Finished,
}

/// Lazy item stream over a paginated endpoint.
pub struct Paginator<'a, T, I> {
    client: &'a IdenaClient<T>,
    path: String,
    page_size: u32,
    page_delay: Duration,
    cursor: Option<String>,
    buffer: VecDeque<I>,
    state: PageState,
    pages_fetched: usize,
}

impl<'a, T: Transport, I: DeserializeOwned> Paginator<'a, T, I> {
    pub(crate) fn new(
        client: &'a IdenaClient<T>,
        path: String,
        page_size: u32,
        page_delay: Duration,
    ) -> Self {
        Self {
            client,
            path,
            page_size,
            page_delay,
            cursor: None,
            buffer: VecDeque::new(),
            state: PageState::NotStarted,
            pages_fetched: 0,
        }
    }

    /// Next item, fetching the next page when needed.
    pub async fn next(&mut self) -> Result<Option<I>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }

            match self.state {
                PageState::Finished => return Ok(None),
                PageState::MorePages => {
                    self.client
                        .throttle()
                        .pause(self.page_delay, PauseReason::Page)
                        .await;
                }
                PageState::NotStarted => {}
            }

            if let Err(e) = self.fetch_page().await {
                self.state = PageState::Finished;
                self.buffer.clear();
                return Err(e);
            }
        }
    }

    /// Drain the remaining items.
    pub async fn collect_all(mut self) -> Result<Vec<I>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let mut params = vec![("limit", self.page_size.to_string())];
        if let Some(cursor) = &self.cursor {
            params.push(("continuationToken", cursor.clone()));
        }

        let envelope = self.client.get(&self.path, &params).await?;
        self.pages_fetched += 1;
        let next_cursor = envelope.next_cursor().map(str::to_string);

        let items = match envelope.result {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(FlipscanError::schema(
                    &self.path,
                    format!("expected result array, got {}", json_kind(&other)),
                ));
            }
        };

        let mut skipped = 0usize;
        for item in items {
            if !item.is_object() {
                skipped += 1;
                continue;
            }
            let parsed = serde_json::from_value(item).map_err(|e| {
                FlipscanError::schema(&self.path, format!("malformed item: {e}"))
            })?;
            self.buffer.push_back(parsed);
        }

        debug!(
            path = %self.path,
            page = self.pages_fetched,
            items = self.buffer.len(),
            skipped,
            has_more = next_cursor.is_some(),
            "Fetched page"
        );

        match next_cursor {
            Some(token) => {
                self.cursor = Some(token);
                self.state = PageState::MorePages;
            }
            None => {
                self.cursor = None;
                self.state = PageState::Finished;
            }
        }

        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
