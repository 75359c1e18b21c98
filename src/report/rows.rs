//! Output rows, metadata documents and file names.

use crate::aggregate::AuthorAggregate;
use crate::models::{Epoch, FlipRecord, OutputConfig};
use crate::report::writer::{CsvRow, serialize_score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUMMARY_FILE: &str = "wrongwords_summary.csv";

pub fn wrongwords_csv(epoch: Epoch) -> String {
    format!("wrongwords_epoch_{epoch}_authors.csv")
}

pub fn wrongwords_jsonl(epoch: Epoch) -> String {
    format!("wrongwords_epoch_{epoch}_authors.jsonl")
}

pub fn wrongwords_meta(epoch: Epoch) -> String {
    format!("wrongwords_epoch_{epoch}_meta.json")
}

pub fn leaderboard_flips_csv(epoch: Epoch) -> String {
    format!("leaderboard_epoch_{epoch}_flips.csv")
}

pub fn leaderboard_identities_csv(epoch: Epoch) -> String {
    format!("leaderboard_epoch_{epoch}_identities.csv")
}

pub fn leaderboard_identities_jsonl(epoch: Epoch) -> String {
    format!("leaderboard_epoch_{epoch}_identities.jsonl")
}

pub fn leaderboard_meta(epoch: Epoch) -> String {
    format!("leaderboard_epoch_{epoch}_meta.json")
}

// ─── wrongWords ────────────────────────────────────────────────────────

/// `wrongwords_epoch_<n>_authors.csv` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCountRow {
    pub rank: usize,
    pub address: String,
    pub wrong_words_count: u64,
    pub flip_count: u64,
    #[serde(rename = "scan_url")]
    pub scan_url: String,
}

impl CsvRow for AuthorCountRow {
    const HEADER: &'static [&'static str] =
        &["rank", "address", "wrongWordsCount", "flipCount", "scan_url"];
}

impl AuthorCountRow {
    pub fn from_ranked(ranked: &[AuthorAggregate], output: &OutputConfig) -> Vec<Self> {
        ranked
            .iter()
            .enumerate()
            .map(|(i, a)| Self {
                rank: i + 1,
                address: a.address.clone(),
                wrong_words_count: a.wrong_words_count,
                flip_count: a.flip_count,
                scan_url: output.address_url(&a.address),
            })
            .collect()
    }
}

/// `wrongwords_epoch_<n>_authors.jsonl` record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCountRecord {
    pub epoch: Epoch,
    pub address: String,
    pub wrong_words: u64,
    pub flip_count: u64,
}

impl AuthorCountRecord {
    pub fn from_ranked(epoch: Epoch, ranked: &[AuthorAggregate]) -> Vec<Self> {
        ranked
            .iter()
            .map(|a| Self {
                epoch,
                address: a.address.clone(),
                wrong_words: a.wrong_words_count,
                flip_count: a.flip_count,
            })
            .collect()
    }
}

/// `wrongwords_summary.csv` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub epoch: Epoch,
    pub address: String,
    pub wrong_words_count: u64,
}

impl CsvRow for SummaryRow {
    const HEADER: &'static [&'static str] = &["epoch", "address", "wrongWordsCount"];
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongWordsMeta {
    pub epoch: Epoch,
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub flips_listed: usize,
    pub flips_fetched: usize,
    pub flagged_flips: usize,
    pub authors_reported: usize,
    pub include_clean: bool,
    /// Cids whose detail lookup failed
    pub failed_cids: Vec<String>,
}

// ─── leaderboard ───────────────────────────────────────────────────────

/// `leaderboard_epoch_<n>_flips.csv` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipRow {
    pub rank: usize,
    #[serde(serialize_with = "serialize_score")]
    pub grade_score: f64,
    pub grade: Option<i64>,
    pub status: String,
    pub wrong_words_votes: Option<i64>,
    pub short_resp_count: Option<i64>,
    pub long_resp_count: Option<i64>,
    pub with_private_part: Option<bool>,
    pub author: String,
    pub cid: String,
    pub word1: String,
    pub word2: String,
    #[serde(rename = "scan_url")]
    pub scan_url: String,
}

impl CsvRow for FlipRow {
    const HEADER: &'static [&'static str] = &[
        "rank",
        "gradeScore",
        "grade",
        "status",
        "wrongWordsVotes",
        "shortRespCount",
        "longRespCount",
        "withPrivatePart",
        "author",
        "cid",
        "word1",
        "word2",
        "scan_url",
    ];
}

impl FlipRow {
    pub fn from_ranked(ranked: &[FlipRecord], output: &OutputConfig) -> Vec<Self> {
        ranked
            .iter()
            .enumerate()
            .map(|(i, f)| Self {
                rank: i + 1,
                grade_score: f.grade_score,
                grade: f.grade,
                status: f.status.clone(),
                wrong_words_votes: f.wrong_words_votes,
                short_resp_count: f.short_resp_count,
                long_resp_count: f.long_resp_count,
                with_private_part: f.with_private_part,
                author: f.author.clone(),
                cid: f.cid.clone(),
                word1: f.word1.clone(),
                word2: f.word2.clone(),
                scan_url: output.flip_url(&f.cid),
            })
            .collect()
    }
}

/// `leaderboard_epoch_<n>_identities.csv` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRow {
    pub rank: usize,
    #[serde(serialize_with = "serialize_score")]
    pub total_grade_score: f64,
    pub flip_count: u64,
    #[serde(serialize_with = "serialize_score")]
    pub avg_grade_score: f64,
    #[serde(serialize_with = "serialize_score")]
    pub max_flip_grade_score: f64,
    pub address: String,
    #[serde(rename = "scan_url")]
    pub scan_url: String,
}

impl CsvRow for IdentityRow {
    const HEADER: &'static [&'static str] = &[
        "rank",
        "totalGradeScore",
        "flipCount",
        "avgGradeScore",
        "maxFlipGradeScore",
        "address",
        "scan_url",
    ];
}

impl IdentityRow {
    pub fn from_ranked(ranked: &[AuthorAggregate], output: &OutputConfig) -> Vec<Self> {
        ranked
            .iter()
            .enumerate()
            .map(|(i, a)| Self {
                rank: i + 1,
                total_grade_score: a.total_score,
                flip_count: a.flip_count,
                avg_grade_score: a.avg_score(),
                max_flip_grade_score: a.max_score,
                address: a.address.clone(),
                scan_url: output.address_url(&a.address),
            })
            .collect()
    }
}

/// `leaderboard_epoch_<n>_identities.jsonl` record. Scores stay numeric.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub epoch: Epoch,
    pub rank: usize,
    pub address: String,
    pub total_grade_score: f64,
    pub flip_count: u64,
    pub avg_grade_score: f64,
    pub max_flip_grade_score: f64,
}

impl IdentityRecord {
    pub fn from_ranked(epoch: Epoch, ranked: &[AuthorAggregate]) -> Vec<Self> {
        ranked
            .iter()
            .enumerate()
            .map(|(i, a)| Self {
                epoch,
                rank: i + 1,
                address: a.address.clone(),
                total_grade_score: a.total_score,
                flip_count: a.flip_count,
                avg_grade_score: a.avg_score(),
                max_flip_grade_score: a.max_score,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardMeta {
    pub epoch: Epoch,
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    /// Empty means every status was accepted
    pub status_filter: Vec<String>,
    pub include_zero: bool,
    pub flips_listed: usize,
    pub flips_kept: usize,
    pub identities: usize,
    pub excluded_bad_authors: Vec<String>,
}
