//! Aggregation of flip records into per-author totals.

mod aggregator;

pub use aggregator::*;
