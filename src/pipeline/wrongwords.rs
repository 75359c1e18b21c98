//! wrongWords pipelines: one epoch, or a run of past epochs.
//!
//! Pipeline flow:
//! Epoch → Scanner (list + details) → FlaggedCount fold → CSV / JSONL / meta

use crate::aggregate::{Aggregator, AuthorAggregate, Reduction};
use crate::client::{IdenaClient, Transport};
use crate::models::{Config, Epoch, Result};
use crate::report::{
    self, AuthorCountRecord, AuthorCountRow, SummaryRow, WrongWordsMeta, write_csv, write_jsonl,
    write_meta,
};
use crate::scan::{EpochScanner, ScanObserver};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Result of a single-epoch wrongWords scan.
#[derive(Debug, Clone)]
pub struct WrongWordsStats {
    pub epoch: Epoch,
    pub flips_listed: usize,
    pub flips_fetched: usize,
    pub flips_failed: usize,
    pub flagged_flips: usize,
    /// Reported authors, most flagged first
    pub authors: Vec<AuthorAggregate>,
    pub csv_path: PathBuf,
    pub jsonl_path: PathBuf,
    pub meta_path: PathBuf,
    pub runtime_secs: f64,
}

impl WrongWordsStats {
    /// Authors with more than one flagged flip.
    pub fn repeat_offenders(&self) -> usize {
        self.authors
            .iter()
            .filter(|a| a.wrong_words_count > 1)
            .count()
    }
}

/// Result of a multi-epoch scan.
#[derive(Debug, Clone, Default)]
pub struct HistoryStats {
    /// Per-epoch results, newest first
    pub epochs: Vec<WrongWordsStats>,
    pub summary_path: PathBuf,
    pub summary_rows: usize,
    pub runtime_secs: f64,
}

/// wrongWords pipeline bound to one client and config.
pub struct WrongWordsPipeline<'a, T, O> {
    client: &'a IdenaClient<T>,
    config: &'a Config,
    observer: O,
}

impl<'a, T: Transport, O: ScanObserver> WrongWordsPipeline<'a, T, O> {
    pub fn new(client: &'a IdenaClient<T>, config: &'a Config, observer: O) -> Self {
        Self {
            client,
            config,
            observer,
        }
    }

    /// Scan `epoch`, or the last finished epoch when `None`.
    pub async fn run(&self, epoch: Option<Epoch>, include_clean: bool) -> Result<WrongWordsStats> {
        let epoch = self.client.resolve_epoch(epoch).await?;
        self.run_epoch(epoch, include_clean).await
    }

    /// Scan one epoch and write its report files.
    pub async fn run_epoch(&self, epoch: Epoch, include_clean: bool) -> Result<WrongWordsStats> {
        let start = Instant::now();
        info!(epoch, base_url = %self.client.base_url(), "Starting wrongWords scan");

        let scanner = EpochScanner::new(self.client, &self.config.scan, &self.observer);
        let outcome = scanner.scan(epoch).await?;

        let mut aggregator = Aggregator::new(Reduction::FlaggedCount).include_unflagged(include_clean);
        aggregator.fold_all(&outcome.records);
        let authors = aggregator.ranked();

        let dir = &self.config.output.dir;
        let csv_path = dir.join(report::wrongwords_csv(epoch));
        let jsonl_path = dir.join(report::wrongwords_jsonl(epoch));
        let meta_path = dir.join(report::wrongwords_meta(epoch));

        write_csv(&csv_path, &AuthorCountRow::from_ranked(&authors, &self.config.output))?;
        write_jsonl(&jsonl_path, &AuthorCountRecord::from_ranked(epoch, &authors))?;

        let flagged_flips = outcome.flagged();
        write_meta(
            &meta_path,
            &WrongWordsMeta {
                epoch,
                generated_at: Utc::now(),
                base_url: self.client.base_url().to_string(),
                flips_listed: outcome.cids_listed,
                flips_fetched: outcome.records.len(),
                flagged_flips,
                authors_reported: authors.len(),
                include_clean,
                failed_cids: outcome.failures.iter().map(|f| f.cid.clone()).collect(),
            },
        )?;

        info!(
            epoch,
            authors = authors.len(),
            flagged = flagged_flips,
            path = %csv_path.display(),
            "Wrote wrongWords report"
        );

        Ok(WrongWordsStats {
            epoch,
            flips_listed: outcome.cids_listed,
            flips_fetched: outcome.records.len(),
            flips_failed: outcome.failures.len(),
            flagged_flips,
            authors,
            csv_path,
            jsonl_path,
            meta_path,
            runtime_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Scan up to `epochs_back` epochs downwards from `from_epoch` (or the
    /// last finished epoch), epoch 0 included, then write the master summary.
    pub async fn run_history(
        &self,
        epochs_back: usize,
        from_epoch: Option<Epoch>,
    ) -> Result<HistoryStats> {
        let start = Instant::now();
        let first = self.client.resolve_epoch(from_epoch).await?;
        let epochs: Vec<Epoch> = (0..=first).rev().take(epochs_back).collect();

        info!(from = first, count = epochs.len(), "Starting historic wrongWords scan");

        let mut stats = HistoryStats::default();
        for epoch in epochs {
            stats.epochs.push(self.run_epoch(epoch, false).await?);
        }

        let rows: Vec<SummaryRow> = stats
            .epochs
            .iter()
            .flat_map(|s| {
                s.authors.iter().map(|a| SummaryRow {
                    epoch: s.epoch,
                    address: a.address.clone(),
                    wrong_words_count: a.wrong_words_count,
                })
            })
            .collect();

        stats.summary_path = self.config.output.dir.join(report::SUMMARY_FILE);
        write_csv(&stats.summary_path, &rows)?;
        stats.summary_rows = rows.len();
        stats.runtime_secs = start.elapsed().as_secs_f64();

        info!(
            epochs = stats.epochs.len(),
            rows = stats.summary_rows,
            path = %stats.summary_path.display(),
            "Wrote master summary"
        );
        Ok(stats)
    }
}
