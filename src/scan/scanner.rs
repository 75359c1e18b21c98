//! Epoch scanner: list an epoch's flips, then look each one up.
//!
//! Listing is all-or-nothing: a pagination failure aborts the scan. Detail
//! lookups are not: a flip whose detail cannot be fetched is reported to the
//! observer, recorded in [`ScanOutcome::failures`] and skipped.

use crate::client::{IdenaClient, PauseReason, Transport, endpoints};
use crate::models::{Epoch, FlipFields, FlipRecord, FlipscanError, Result, ScanConfig};
use crate::scan::observer::ScanObserver;
use serde_json::Value;

/// A flip whose detail lookup failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// 1-based position in the listing
    pub index: usize,
    pub cid: String,
    pub error: String,
}

/// Result of scanning one epoch.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub epoch: Epoch,
    /// Identifiers returned by the listing
    pub cids_listed: usize,
    /// Successfully fetched flips, in listing order
    pub records: Vec<FlipRecord>,
    /// Flips skipped after a failed lookup
    pub failures: Vec<ItemFailure>,
}

impl ScanOutcome {
    /// Flips marked wrongWords among the fetched records.
    pub fn flagged(&self) -> usize {
        self.records.iter().filter(|r| r.wrong_words).count()
    }
}

/// Scans epochs through an [`IdenaClient`].
pub struct EpochScanner<'a, T, O> {
    client: &'a IdenaClient<T>,
    settings: &'a ScanConfig,
    observer: O,
}

impl<'a, T: Transport, O: ScanObserver> EpochScanner<'a, T, O> {
    pub fn new(client: &'a IdenaClient<T>, settings: &'a ScanConfig, observer: O) -> Self {
        Self {
            client,
            settings,
            observer,
        }
    }

    /// All flip identifiers of `epoch`, in server order. Blank cids are dropped.
    pub async fn list_cids(&self, epoch: Epoch) -> Result<Vec<String>> {
        let mut pages = self.client.paginate::<FlipFields>(
            endpoints::epoch_flips(epoch),
            self.settings.page_size,
            self.settings.page_delay(),
        );

        let mut cids = Vec::new();
        while let Some(flip) = pages.next().await? {
            if let Some(cid) = flip.cid.filter(|c| !c.trim().is_empty()) {
                cids.push(cid);
            }
        }
        Ok(cids)
    }

    /// Detail of one flip.
    pub async fn fetch_record(&self, cid: &str) -> Result<FlipRecord> {
        let path = endpoints::flip(cid);
        let envelope = self.client.get(&path, &[]).await?;

        let fields: FlipFields = match envelope.result {
            Some(value @ Value::Object(_)) => serde_json::from_value(value)
                .map_err(|e| FlipscanError::schema(&path, format!("malformed flip: {e}")))?,
            _ => return Err(FlipscanError::schema(&path, "detail result is not an object")),
        };

        Ok(FlipRecord::from_fields(Some(cid), fields))
    }

    /// List `epoch` and fetch every flip's detail.
    pub async fn scan(&self, epoch: Epoch) -> Result<ScanOutcome> {
        let cids = self.list_cids(epoch).await?;
        let total = cids.len();
        self.observer.listed(epoch, total);

        let mut outcome = ScanOutcome {
            epoch,
            cids_listed: total,
            records: Vec::with_capacity(total),
            failures: Vec::new(),
        };

        for (i, cid) in cids.into_iter().enumerate() {
            let index = i + 1;
            if i > 0 {
                self.client
                    .throttle()
                    .pause(self.settings.item_delay(), PauseReason::Item)
                    .await;
            }

            match self.fetch_record(&cid).await {
                Ok(record) => {
                    self.observer.item_fetched(index, total, &record);
                    outcome.records.push(record);
                }
                Err(e) => {
                    self.observer.item_failed(index, total, &cid, &e);
                    outcome.failures.push(ItemFailure {
                        index,
                        cid,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.observer
            .finished(epoch, outcome.records.len(), outcome.failures.len());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, Reduction};
    use crate::models::ApiError;
    use crate::scan::observer::{RecordingObserver, ScanEvent};
    use crate::testing::{ScriptedTransport, push_pages, scripted_client};
    use serde_json::json;

    fn settings(page_size: u32) -> ScanConfig {
        ScanConfig {
            page_size,
            page_delay_ms: 0,
            item_delay_ms: 0,
        }
    }

    /// Six flips over three pages; flip #4 is by 0xabc and marked wrongWords.
    fn six_flip_epoch(transport: &ScriptedTransport, epoch: Epoch) {
        let items: Vec<_> = (1..=6).map(|i| json!({ "cid": format!("cid{i}") })).collect();
        push_pages(transport, &endpoints::epoch_flips(epoch), items, 2);

        for i in 1..=6 {
            let author = if i == 4 { "0xABC".to_string() } else { format!("0x{i:03}") };
            transport.push_json(
                &endpoints::flip(&format!("cid{i}")),
                json!({"result": {"author": author, "wrongWords": i == 4}}),
            );
        }
    }

    #[tokio::test]
    async fn test_flagged_flip_counts_once_for_author() {
        let transport = ScriptedTransport::new();
        six_flip_epoch(&transport, 170);
        let client = scripted_client(transport);
        let cfg = settings(2);
        let observer = RecordingObserver::new();

        let outcome = EpochScanner::new(&client, &cfg, &observer)
            .scan(170)
            .await
            .unwrap();

        assert_eq!(outcome.cids_listed, 6);
        assert_eq!(outcome.records.len(), 6);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.flagged(), 1);

        let mut agg = Aggregator::new(Reduction::FlaggedCount);
        agg.fold_all(&outcome.records);
        assert_eq!(agg.get("0xabc").unwrap().wrong_words_count, 1);
        assert_eq!(client.transport().calls_to("/Epoch/170/Flips"), 3);
    }

    #[tokio::test]
    async fn test_failed_detail_is_skipped_and_reported_once() {
        let transport = ScriptedTransport::new();
        let items: Vec<_> = (1..=6).map(|i| json!({ "cid": format!("cid{i}") })).collect();
        push_pages(&transport, "/Epoch/9/Flips", items, 2);
        for i in 1..=6 {
            let path = endpoints::flip(&format!("cid{i}"));
            if i == 3 {
                for _ in 0..3 {
                    transport.push_network_error(&path);
                }
                continue;
            }
            transport.push_json(
                &path,
                json!({"result": {"author": "0xDEF", "wrongWords": i % 2 == 0}}),
            );
        }
        let client = scripted_client(transport);
        let cfg = settings(2);
        let observer = RecordingObserver::new();

        let outcome = EpochScanner::new(&client, &cfg, &observer)
            .scan(9)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 5);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].cid, "cid3");
        assert_eq!(outcome.failures[0].index, 3);
        assert_eq!(observer.failures(), 1);

        let mut agg = Aggregator::new(Reduction::FlaggedCount);
        agg.fold_all(&outcome.records);
        let def = agg.get("0xdef").unwrap();
        assert_eq!(def.flip_count, 5);
        assert_eq!(def.wrong_words_count, 3);

        assert_eq!(
            observer.events().last(),
            Some(&ScanEvent::Finished {
                epoch: 9,
                fetched: 5,
                failed: 1
            })
        );
    }

    #[tokio::test]
    async fn test_detail_api_error_is_per_item() {
        let transport = ScriptedTransport::new();
        push_pages(&transport, "/Epoch/2/Flips", vec![json!({"cid": "a"}), json!({"cid": "b"})], 10);
        transport.push_json("/Flip/a", json!({"error": {"message": "not found"}}));
        transport.push_json("/Flip/b", json!({"result": null}));
        let client = scripted_client(transport);
        let cfg = settings(10);

        let outcome = EpochScanner::new(&client, &cfg, RecordingObserver::new())
            .scan(2)
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures[0].error.contains("not found"));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_scan() {
        let transport = ScriptedTransport::new();
        transport.push_json("/Epoch/4/Flips", json!({"result": "nope"}));
        let client = scripted_client(transport);
        let cfg = settings(10);

        let err = EpochScanner::new(&client, &cfg, RecordingObserver::new())
            .scan(4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlipscanError::Api(ApiError::UnexpectedSchema { .. })
        ));
    }

    #[tokio::test]
    async fn test_blank_cids_are_not_looked_up() {
        let transport = ScriptedTransport::new();
        push_pages(
            &transport,
            "/Epoch/5/Flips",
            vec![json!({"cid": ""}), json!({"author": "0x1"}), json!({"cid": "c"})],
            10,
        );
        transport.push_json("/Flip/c", json!({"result": {"author": "0x1"}}));
        let client = scripted_client(transport);
        let cfg = settings(10);

        let scanner = EpochScanner::new(&client, &cfg, RecordingObserver::new());
        let outcome = scanner.scan(5).await.unwrap();
        assert_eq!(outcome.cids_listed, 1);
        assert_eq!(outcome.records[0].cid, "c");
        assert_eq!(client.throttle().stats().total_requests, 2);
    }
}
