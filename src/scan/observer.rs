//! Progress reporting for scans.
//!
//! Scan logic never prints. It reports to a [`ScanObserver`]; the binary
//! plugs in a progress bar, library users get structured logs, tests record
//! the calls.

use crate::models::{Epoch, FlipRecord, FlipscanError};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tracing::{info, warn};

/// Receives scan progress. Every method has a no-op default.
pub trait ScanObserver {
    /// Flip identifiers for `epoch` have been listed.
    fn listed(&self, _epoch: Epoch, _total: usize) {}

    /// Detail for flip `index` (1-based) of `total` was fetched.
    fn item_fetched(&self, _index: usize, _total: usize, _record: &FlipRecord) {}

    /// Detail for flip `index` of `total` failed and is skipped.
    fn item_failed(&self, _index: usize, _total: usize, _cid: &str, _error: &FlipscanError) {}

    /// All details for `epoch` were processed.
    fn finished(&self, _epoch: Epoch, _fetched: usize, _failed: usize) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl ScanObserver for NullObserver {}

/// Observer that logs through `tracing`.
pub struct TracingObserver {
    /// Log a progress line every `every` items (0 disables)
    every: usize,
}

impl TracingObserver {
    pub fn new(every: usize) -> Self {
        Self { every }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ScanObserver for TracingObserver {
    fn listed(&self, epoch: Epoch, total: usize) {
        info!(epoch, flips = total, "Listed flips, scanning details");
    }

    fn item_fetched(&self, index: usize, total: usize, record: &FlipRecord) {
        if self.every > 0 && index % self.every == 0 {
            info!(
                processed = index,
                total,
                author = %record.author,
                "Scan progress"
            );
        }
    }

    fn item_failed(&self, index: usize, total: usize, cid: &str, error: &FlipscanError) {
        warn!(index, total, cid = %short_cid(cid), error = %error, "Flip detail failed, skipping");
    }

    fn finished(&self, epoch: Epoch, fetched: usize, failed: usize) {
        info!(epoch, fetched, failed, "Epoch scan complete");
    }
}

/// Observer driving an `indicatif` progress bar.
pub struct ProgressObserver {
    bar: Mutex<Option<ProgressBar>>,
    flagged: Mutex<usize>,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            flagged: Mutex::new(0),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanObserver for ProgressObserver {
    fn listed(&self, epoch: Epoch, total: usize) {
        info!(epoch, flips = total, "Listed flips, scanning details");

        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(format!("epoch {epoch}"));

        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
        if let Ok(mut flagged) = self.flagged.lock() {
            *flagged = 0;
        }
    }

    fn item_fetched(&self, index: usize, _total: usize, record: &FlipRecord) {
        let flagged = match self.flagged.lock() {
            Ok(mut n) => {
                if record.wrong_words {
                    *n += 1;
                }
                *n
            }
            Err(_) => 0,
        };
        self.with_bar(|bar| {
            bar.set_position(index as u64);
            bar.set_message(format!("wrongWords: {flagged}"));
        });
    }

    fn item_failed(&self, index: usize, total: usize, cid: &str, error: &FlipscanError) {
        let log = || {
            warn!(index, total, cid = %short_cid(cid), error = %error, "Flip detail failed, skipping");
        };

        let mut logged = false;
        self.with_bar(|bar| {
            bar.set_position(index as u64);
            bar.suspend(|| log());
            logged = true;
        });
        if !logged {
            log();
        }
    }

    fn finished(&self, epoch: Epoch, fetched: usize, failed: usize) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_with_message(format!("Done! {fetched} fetched, {failed} failed"));
            }
        }
        info!(epoch, fetched, failed, "Epoch scan complete");
    }
}

/// Observer remembering every call.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ScanEvent>>,
}

/// A recorded observer call.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Listed { epoch: Epoch, total: usize },
    Fetched { index: usize, cid: String },
    Failed { index: usize, cid: String, error: String },
    Finished { epoch: Epoch, fetched: usize, failed: usize },
}

#[cfg(test)]
impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded failures.
    pub fn failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ScanEvent::Failed { .. }))
            .count()
    }

    fn push(&self, event: ScanEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
impl ScanObserver for RecordingObserver {
    fn listed(&self, epoch: Epoch, total: usize) {
        self.push(ScanEvent::Listed { epoch, total });
    }

    fn item_fetched(&self, index: usize, _total: usize, record: &FlipRecord) {
        self.push(ScanEvent::Fetched {
            index,
            cid: record.cid.clone(),
        });
    }

    fn item_failed(&self, index: usize, _total: usize, cid: &str, error: &FlipscanError) {
        self.push(ScanEvent::Failed {
            index,
            cid: cid.to_string(),
            error: error.to_string(),
        });
    }

    fn finished(&self, epoch: Epoch, fetched: usize, failed: usize) {
        self.push(ScanEvent::Finished {
            epoch,
            fetched,
            failed,
        });
    }
}

impl<O: ScanObserver + ?Sized> ScanObserver for &O {
    fn listed(&self, epoch: Epoch, total: usize) {
        (**self).listed(epoch, total);
    }

    fn item_fetched(&self, index: usize, total: usize, record: &FlipRecord) {
        (**self).item_fetched(index, total, record);
    }

    fn item_failed(&self, index: usize, total: usize, cid: &str, error: &FlipscanError) {
        (**self).item_failed(index, total, cid, error);
    }

    fn finished(&self, epoch: Epoch, fetched: usize, failed: usize) {
        (**self).finished(epoch, fetched, failed);
    }
}

/// First 18 characters of a cid, for log lines.
pub fn short_cid(cid: &str) -> &str {
    match cid.char_indices().nth(18) {
        Some((i, _)) => &cid[..i],
        None => cid,
    }
}
