//! Bad-author filter for leaderboards.

use crate::client::{IdenaClient, Transport, endpoints};
use crate::models::{BadAuthorEntry, Epoch, Result, ScanConfig};
use std::collections::BTreeSet;
use tracing::debug;

/// Addresses penalized for wrong words in `epoch`.
///
/// An entry qualifies when its reason is `WrongWords` or its `wrongWords`
/// flag is set. Addresses are lowercased; blank ones are ignored.
pub async fn fetch_bad_authors<T: Transport>(
    client: &IdenaClient<T>,
    settings: &ScanConfig,
    epoch: Epoch,
) -> Result<BTreeSet<String>> {
    let mut pages = client.paginate::<BadAuthorEntry>(
        endpoints::epoch_bad_authors(epoch),
        settings.page_size,
        settings.page_delay(),
    );

    let mut bad = BTreeSet::new();
    let mut seen = 0usize;
    while let Some(entry) = pages.next().await? {
        seen += 1;
        if !entry.is_wrong_words() {
            continue;
        }
        if let Some(address) = entry.normalized_address() {
            bad.insert(address);
        }
    }

    debug!(epoch, entries = seen, wrong_words = bad.len(), "Fetched bad authors");
    Ok(bad)
}
