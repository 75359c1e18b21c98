//! Report output: CSV/JSONL/meta writers and the offline summary reader.

mod rows;
mod summary;
mod writer;

pub use rows::*;
pub use summary::*;
pub use writer::*;
