//! Epoch scanning: flip listing, detail lookups, bad authors.

mod bad_authors;
mod observer;
mod scanner;

pub use bad_authors::*;
pub use observer::*;
pub use scanner::*;
