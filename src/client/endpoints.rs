//! Idena API paths, relative to the base URL.

use crate::models::Epoch;

pub const LAST_EPOCH: &str = "/Epoch/Last";

/// Paginated flip list of an epoch.
pub fn epoch_flips(epoch: Epoch) -> String {
    format!("/Epoch/{epoch}/Flips")
}

/// Paginated bad-author list of an epoch.
pub fn epoch_bad_authors(epoch: Epoch) -> String {
    format!("/Epoch/{epoch}/Authors/Bad")
}

/// Detail of a single flip.
pub fn flip(cid: &str) -> String {
    format!("/Flip/{cid}")
}
