//! Per-author folding of flip records.
//!
//! Every fold updates all counters of an author. The [`Reduction`] only
//! decides which counter ranks authors and which authors are reported, so a
//! single pass can serve any report.

use crate::models::FlipRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Score sums are kept in fixed point at the 8-decimal report precision, so a
/// total does not depend on the order records arrive in.
const SCORE_SCALE: f64 = 1e8;

/// Which aggregate value ranks authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Number of flips flagged wrongWords (one per flip)
    FlaggedCount,
    /// Sum of grade scores
    ScoreSum,
    /// Sum of grade scores, reported with average and maximum
    ScoreStats,
}

/// Running totals for one author.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorAggregate {
    pub address: String,
    pub total_score: f64,
    pub flip_count: u64,
    /// Highest grade score seen; 0.0 before the first fold
    pub max_score: f64,
    pub wrong_words_count: u64,
    #[serde(skip)]
    score_units: i128,
}

impl AuthorAggregate {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            total_score: 0.0,
            flip_count: 0,
            max_score: 0.0,
            wrong_words_count: 0,
            score_units: 0,
        }
    }

    /// Add one record.
    pub fn fold(&mut self, record: &FlipRecord) {
        self.max_score = if self.flip_count == 0 {
            record.grade_score
        } else {
            self.max_score.max(record.grade_score)
        };
        self.score_units += (record.grade_score * SCORE_SCALE).round() as i128;
        self.total_score = self.score_units as f64 / SCORE_SCALE;
        self.flip_count += 1;
        if record.wrong_words {
            self.wrong_words_count += 1;
        }
    }

    pub fn avg_score(&self) -> f64 {
        if self.flip_count == 0 {
            0.0
        } else {
            self.total_score / self.flip_count as f64
        }
    }
}

/// Fold of flip records keyed by author address.
#[derive(Debug, Clone)]
pub struct Aggregator {
    reduction: Reduction,
    include_unflagged: bool,
    authors: HashMap<String, AuthorAggregate>,
}

impl Aggregator {
    pub fn new(reduction: Reduction) -> Self {
        Self {
            reduction,
            include_unflagged: false,
            authors: HashMap::new(),
        }
    }

    /// Report authors without flagged flips under `FlaggedCount` too.
    pub fn include_unflagged(mut self, include: bool) -> Self {
        self.include_unflagged = include;
        self
    }

    /// Fold one record. Records without an author are ignored (returns false).
    pub fn fold(&mut self, record: &FlipRecord) -> bool {
        if record.author.is_empty() {
            return false;
        }
        self.authors
            .entry(record.author.clone())
            .or_insert_with(|| AuthorAggregate::new(record.author.clone()))
            .fold(record);
        true
    }

    pub fn fold_all<'r>(&mut self, records: impl IntoIterator<Item = &'r FlipRecord>) {
        for record in records {
            self.fold(record);
        }
    }

    pub fn get(&self, address: &str) -> Option<&AuthorAggregate> {
        self.authors.get(address)
    }

    /// Distinct authors folded, reported or not.
    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    /// The ranking value of `agg` under this reduction.
    pub fn value(&self, agg: &AuthorAggregate) -> f64 {
        match self.reduction {
            Reduction::FlaggedCount => agg.wrong_words_count as f64,
            Reduction::ScoreSum | Reduction::ScoreStats => agg.total_score,
        }
    }

    /// Reported authors, best first.
    ///
    /// Descending by value; `ScoreStats` then by flip count descending; ties
    /// end on address ascending.
    pub fn ranked(&self) -> Vec<AuthorAggregate> {
        let mut rows: Vec<AuthorAggregate> = self
            .authors
            .values()
            .filter(|a| self.is_reported(a))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            self.value(b)
                .total_cmp(&self.value(a))
                .then_with(|| match self.reduction {
                    Reduction::ScoreStats => b.flip_count.cmp(&a.flip_count),
                    _ => Ordering::Equal,
                })
                .then_with(|| a.address.cmp(&b.address))
        });
        rows
    }

    fn is_reported(&self, agg: &AuthorAggregate) -> bool {
        match self.reduction {
            Reduction::FlaggedCount => self.include_unflagged || agg.wrong_words_count > 0,
            Reduction::ScoreSum | Reduction::ScoreStats => true,
        }
    }
}

/// Flips best first: grade score descending, then cid ascending.
pub fn rank_flips(mut records: Vec<FlipRecord>) -> Vec<FlipRecord> {
    records.sort_by(|a, b| {
        b.grade_score
            .total_cmp(&a.grade_score)
            .then_with(|| a.cid.cmp(&b.cid))
    });
    records
}
