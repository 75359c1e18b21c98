//! Core data models for flipscan.

mod config;
mod error;
mod flip;

pub use config::*;
pub use error::*;
pub use flip::*;
