//! Pipeline module - wrongWords scans and grade-score leaderboards.

mod leaderboard;
mod wrongwords;

pub use leaderboard::*;
pub use wrongwords::*;
