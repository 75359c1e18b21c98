//! Grade-score leaderboards for one epoch.
//!
//! Pipeline flow:
//! Bad authors + Epoch flip listing → filter → ScoreStats fold → flip and
//! identity CSVs (+ optional JSONL) → meta

use crate::aggregate::{Aggregator, AuthorAggregate, Reduction, rank_flips};
use crate::client::{IdenaClient, Transport, endpoints};
use crate::models::{Config, Epoch, FlipFields, FlipRecord, Result};
use crate::report::{
    self, FlipRow, IdentityRecord, IdentityRow, LeaderboardMeta, write_csv, write_jsonl,
    write_meta,
};
use crate::scan::fetch_bad_authors;
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Flip filters and output switches.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardOptions {
    /// Accepted statuses; empty accepts all
    pub statuses: Vec<String>,
    /// Keep flips with a grade score of zero or below
    pub include_zero: bool,
    /// Also write the identity JSONL sidecar
    pub jsonl: bool,
}

impl LeaderboardOptions {
    /// Whether `record` belongs on the leaderboard.
    pub fn keeps(&self, record: &FlipRecord, bad_authors: &BTreeSet<String>) -> bool {
        if record.author.is_empty() || bad_authors.contains(&record.author) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.iter().any(|s| *s == record.status) {
            return false;
        }
        if !self.include_zero && record.grade_score <= 0.0 {
            return false;
        }
        !record.cid.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardStats {
    pub epoch: Epoch,
    pub flips_listed: usize,
    /// Distinct wrong-words authors excluded
    pub bad_authors: usize,
    /// Kept flips, best first
    pub flips: Vec<FlipRecord>,
    /// Identities, highest total first
    pub identities: Vec<AuthorAggregate>,
    pub flips_path: PathBuf,
    pub identities_path: PathBuf,
    pub identities_jsonl_path: Option<PathBuf>,
    pub meta_path: PathBuf,
    pub runtime_secs: f64,
}

/// Listed flips between progress lines.
const PROGRESS_EVERY: usize = 2000;

/// Running `seen/kept` counters for the flip listing.
#[derive(Debug)]
struct ListingProgress {
    epoch: Epoch,
    every: usize,
    seen: usize,
    kept: usize,
}

impl ListingProgress {
    fn new(epoch: Epoch, every: usize) -> Self {
        Self {
            epoch,
            every,
            seen: 0,
            kept: 0,
        }
    }

    /// Count one listed flip. Returns true when a progress line was logged.
    fn record(&mut self, kept: bool) -> bool {
        self.seen += 1;
        if kept {
            self.kept += 1;
        }
        let due = self.every > 0 && self.seen % self.every == 0;
        if due {
            info!(epoch = self.epoch, seen = self.seen, kept = self.kept, "Listing flips");
        }
        due
    }
}

pub struct LeaderboardPipeline<'a, T> {
    client: &'a IdenaClient<T>,
    config: &'a Config,
}

impl<'a, T: Transport> LeaderboardPipeline<'a, T> {
    pub fn new(client: &'a IdenaClient<T>, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// Build both leaderboards for `epoch`, or the last finished epoch.
    pub async fn run(
        &self,
        epoch: Option<Epoch>,
        options: &LeaderboardOptions,
    ) -> Result<LeaderboardStats> {
        let start = Instant::now();
        let epoch = self.client.resolve_epoch(epoch).await?;
        let settings = &self.config.scan;

        let bad_authors = fetch_bad_authors(self.client, settings, epoch).await?;
        info!(epoch, bad_authors = bad_authors.len(), "Loaded wrong-words bad authors");

        let mut pages = self.client.paginate::<FlipFields>(
            endpoints::epoch_flips(epoch),
            settings.page_size,
            settings.page_delay(),
        );

        let mut progress = ListingProgress::new(epoch, PROGRESS_EVERY);
        let mut kept = Vec::new();
        while let Some(fields) = pages.next().await? {
            let record = FlipRecord::from_fields(None, fields);
            let keep = options.keeps(&record, &bad_authors);
            progress.record(keep);
            if keep {
                kept.push(record);
            }
        }
        let flips_listed = progress.seen;
        debug!(epoch, pages = pages.pages_fetched(), listed = flips_listed, "Listed flips");

        let mut aggregator = Aggregator::new(Reduction::ScoreStats);
        aggregator.fold_all(&kept);
        let identities = aggregator.ranked();
        let flips = rank_flips(kept);

        let output = &self.config.output;
        let flips_path = output.dir.join(report::leaderboard_flips_csv(epoch));
        let identities_path = output.dir.join(report::leaderboard_identities_csv(epoch));
        let meta_path = output.dir.join(report::leaderboard_meta(epoch));

        write_csv(&flips_path, &FlipRow::from_ranked(&flips, output))?;
        write_csv(&identities_path, &IdentityRow::from_ranked(&identities, output))?;

        let identities_jsonl_path = if options.jsonl {
            let path = output.dir.join(report::leaderboard_identities_jsonl(epoch));
            write_jsonl(&path, &IdentityRecord::from_ranked(epoch, &identities))?;
            Some(path)
        } else {
            None
        };

        write_meta(
            &meta_path,
            &LeaderboardMeta {
                epoch,
                generated_at: Utc::now(),
                base_url: self.client.base_url().to_string(),
                status_filter: options.statuses.clone(),
                include_zero: options.include_zero,
                flips_listed,
                flips_kept: flips.len(),
                identities: identities.len(),
                excluded_bad_authors: bad_authors.iter().cloned().collect(),
            },
        )?;

        info!(
            epoch,
            flips = flips.len(),
            identities = identities.len(),
            path = %identities_path.display(),
            "Wrote leaderboards"
        );

        Ok(LeaderboardStats {
            epoch,
            flips_listed,
            bad_authors: bad_authors.len(),
            flips,
            identities,
            flips_path,
            identities_path,
            identities_jsonl_path,
            meta_path,
            runtime_secs: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, push_pages, scripted_client, test_config};
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    fn listing() -> Vec<Value> {
        vec![
            json!({"cid": "f1", "author": "0xAAA", "status": "Qualified", "gradeScore": 3.5, "grade": 3}),
            json!({"cid": "f2", "author": "0xaaa", "status": "WeaklyQualified", "gradeScore": "6.5"}),
            json!({"cid": "f3", "author": "0xbad", "status": "Qualified", "gradeScore": 9.0}),
            json!({"cid": "f4", "author": "0xccc", "status": "Qualified", "gradeScore": 0}),
            json!({"cid": "f5", "author": "", "status": "Qualified", "gradeScore": 2.0}),
            json!({"cid": "", "author": "0xddd", "status": "Qualified", "gradeScore": 2.0}),
            json!({"cid": "f7", "author": "0xddd", "status": "Qualified", "gradeScore": 1.0}),
        ]
    }

    fn script(transport: &ScriptedTransport) {
        push_pages(
            transport,
            "/Epoch/12/Authors/Bad",
            vec![json!({"address": "0xBAD", "reason": "WrongWords"})],
            10,
        );
        push_pages(transport, "/Epoch/12/Flips", listing(), 3);
    }

    #[tokio::test]
    async fn test_leaderboard_filters_and_ranks() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let transport = ScriptedTransport::new();
        script(&transport);
        let client = scripted_client(transport);

        let stats = LeaderboardPipeline::new(&client, &config)
            .run(Some(12), &LeaderboardOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.flips_listed, 7);
        assert_eq!(stats.bad_authors, 1);
        let cids: Vec<&str> = stats.flips.iter().map(|f| f.cid.as_str()).collect();
        assert_eq!(cids, vec!["f2", "f1", "f7"]);

        let top = &stats.identities[0];
        assert_eq!(top.address, "0xaaa");
        assert_eq!(top.total_score, 10.0);
        assert_eq!(top.flip_count, 2);
        assert_eq!(top.avg_score(), 5.0);
        assert_eq!(top.max_score, 6.5);
        assert!(stats.identities_jsonl_path.is_none());

        let ids = fs::read_to_string(&stats.identities_path).unwrap();
        assert_eq!(
            ids.lines().nth(1).unwrap(),
            "1,10.00000000,2,5.00000000,6.50000000,0xaaa,https://scan.idena.io/address/0xaaa"
        );

        let meta: Value = serde_json::from_str(&fs::read_to_string(&stats.meta_path).unwrap()).unwrap();
        assert_eq!(meta["excludedBadAuthors"], json!(["0xbad"]));
        assert_eq!(meta["flipsKept"], 3);
    }

    #[tokio::test]
    async fn test_status_filter_zero_scores_and_jsonl() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let transport = ScriptedTransport::new();
        script(&transport);
        let client = scripted_client(transport);

        let options = LeaderboardOptions {
            statuses: vec!["Qualified".to_string()],
            include_zero: true,
            jsonl: true,
        };
        let stats = LeaderboardPipeline::new(&client, &config)
            .run(Some(12), &options)
            .await
            .unwrap();

        let cids: Vec<&str> = stats.flips.iter().map(|f| f.cid.as_str()).collect();
        assert_eq!(cids, vec!["f1", "f7", "f4"]);

        let path = stats.identities_jsonl_path.unwrap();
        let lines = fs::read_to_string(path).unwrap();
        let first: Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert_eq!(first["address"], "0xaaa");
        assert_eq!(first["totalGradeScore"], 3.5);
    }

    #[test]
    fn test_listing_progress_counts_seen_and_kept() {
        let mut progress = ListingProgress::new(12, 2);
        let due: Vec<bool> = [true, false, false, true, true]
            .into_iter()
            .map(|kept| progress.record(kept))
            .collect();

        assert_eq!(due, vec![false, true, false, true, false]);
        assert_eq!(progress.seen, 5);
        assert_eq!(progress.kept, 3);

        let mut silent = ListingProgress::new(12, 0);
        assert!(!silent.record(true));
    }

    #[test]
    fn test_bad_author_is_never_kept() {
        let record = FlipRecord::from_fields(
            None,
            serde_json::from_value(json!({"cid": "x", "author": "0xBAD", "gradeScore": 5})).unwrap(),
        );
        let bad: BTreeSet<String> = ["0xbad".to_string()].into();
        let options = LeaderboardOptions {
            include_zero: true,
            ..Default::default()
        };
        assert!(!options.keeps(&record, &bad));
        assert!(options.keeps(&record, &BTreeSet::new()));
    }
}
