//! Offline summary of earlier wrongWords reports.
//!
//! Reads every `wrongwords_epoch_<n>_authors.csv` in a directory and splits
//! each epoch's authors into those with exactly one flagged flip and repeat
//! offenders.

use crate::models::{Epoch, FlipscanError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Classification of one epoch report.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochTally {
    pub epoch: Epoch,
    pub path: PathBuf,
    /// Authors with exactly one flagged flip
    pub single: usize,
    /// Authors with two or more flagged flips
    pub multiple: usize,
    /// `(address, count)` of repeat offenders, in file order
    pub repeat_offenders: Vec<(String, u64)>,
    /// Rows skipped because the count did not parse
    pub skipped_rows: usize,
}

/// Epoch reports in `dir`, ordered by epoch.
pub fn find_epoch_reports(dir: &Path) -> Result<Vec<(Epoch, PathBuf)>> {
    let name_re = Regex::new(r"^wrongwords_epoch_(\d+)_authors\.csv$")
        .map_err(|e| FlipscanError::InvalidInput(e.to_string()))?;

    let pattern = format!(
        "{}/wrongwords_epoch_*_authors.csv",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let entries =
        glob::glob(&pattern).map_err(|e| FlipscanError::InvalidInput(format!("bad pattern: {e}")))?;

    let mut reports = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| FlipscanError::io("listing report files", e.into_error()))?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(epoch) = name_re
            .captures(name)
            .and_then(|c| c[1].parse::<Epoch>().ok())
        else {
            continue;
        };
        reports.push((epoch, path));
    }

    reports.sort_by_key(|(epoch, _)| *epoch);
    debug!(dir = %dir.display(), reports = reports.len(), "Found epoch reports");
    Ok(reports)
}

/// Classify the authors of one report.
pub fn tally_report(epoch: Epoch, path: &Path) -> Result<EpochTally> {
    let context = || format!("reading {}", path.display());
    let mut reader = csv::Reader::from_path(path).map_err(|e| FlipscanError::csv(context(), e))?;

    let headers = reader
        .headers()
        .map_err(|e| FlipscanError::csv(context(), e))?
        .clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            FlipscanError::InvalidInput(format!("{} has no `{name}` column", path.display()))
        })
    };
    let address_col = column("address")?;
    let count_col = column("wrongWordsCount")?;

    let mut tally = EpochTally {
        epoch,
        path: path.to_path_buf(),
        single: 0,
        multiple: 0,
        repeat_offenders: Vec::new(),
        skipped_rows: 0,
    };

    for record in reader.records() {
        let record = record.map_err(|e| FlipscanError::csv(context(), e))?;
        let count = record
            .get(count_col)
            .and_then(|c| c.trim().parse::<u64>().ok());
        let Some(count) = count else {
            tally.skipped_rows += 1;
            continue;
        };
        let address = record.get(address_col).unwrap_or_default().trim();

        match count {
            0 => {}
            1 => tally.single += 1,
            n => {
                tally.multiple += 1;
                tally.repeat_offenders.push((address.to_string(), n));
            }
        }
    }

    if tally.skipped_rows > 0 {
        warn!(epoch, skipped = tally.skipped_rows, "Skipped rows with unreadable counts");
    }
    Ok(tally)
}

/// Tally every epoch report in `dir`.
pub fn summarize_dir(dir: &Path) -> Result<Vec<EpochTally>> {
    find_epoch_reports(dir)?
        .into_iter()
        .map(|(epoch, path)| tally_report(epoch, &path))
        .collect()
}
