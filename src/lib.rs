//! flipscan - Idena flip quality scans over the public indexer API.
//!
//! ## Architecture
//!
//! - **Client**: `IdenaClient` over a pluggable `Transport`, with retry,
//!   backoff and lazy cursor pagination
//! - **Scan**: `EpochScanner` lists an epoch's flips and fetches each detail;
//!   per-flip failures are recorded, not raised
//! - **Aggregate**: pure per-author fold (`FlaggedCount`, `ScoreSum`,
//!   `ScoreStats`) with a stable sort policy
//! - **Report**: CSV/JSONL/meta writers and the offline summary reader
//!
//! ## Pipelines
//!
//! - **wrongWords**: Scan → FlaggedCount → report (one epoch or many)
//! - **Leaderboard**: Bad authors + listing → filter → ScoreStats → report

pub mod aggregate;
pub mod client;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scan;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use aggregate::{Aggregator, AuthorAggregate, Reduction};
pub use client::{HttpTransport, IdenaClient, Throttle, Transport};
pub use models::{ApiError, Config, Epoch, FlipRecord, FlipscanError, Result};
pub use pipeline::{LeaderboardOptions, LeaderboardPipeline, WrongWordsPipeline};
pub use scan::{EpochScanner, NullObserver, ProgressObserver, ScanObserver, TracingObserver};
