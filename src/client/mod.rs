//! Idena API client module.

pub mod endpoints;
mod idena_client;
mod paginator;
mod throttle;
mod transport;

pub use idena_client::*;
pub use paginator::*;
pub use throttle::*;
pub use transport::*;
