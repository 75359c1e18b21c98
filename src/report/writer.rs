//! CSV, JSONL and metadata writers.
//!
//! Files are overwritten in place. Parent directories are created on demand.

use crate::models::{FlipscanError, Result};
use serde::{Serialize, Serializer};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// A CSV row with a fixed header.
///
/// The header is written even when there are no rows, so serde field order
/// must match `HEADER`.
pub trait CsvRow: Serialize {
    const HEADER: &'static [&'static str];
}

/// Scores are written with eight decimals.
pub fn serialize_score<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.8}"))
}

pub fn write_csv<R: CsvRow>(path: &Path, rows: &[R]) -> Result<()> {
    ensure_parent(path)?;
    let context = || format!("writing {}", path.display());

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| FlipscanError::csv(context(), e))?;

    writer
        .write_record(R::HEADER)
        .map_err(|e| FlipscanError::csv(context(), e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| FlipscanError::csv(context(), e))?;
    }
    writer.flush().map_err(|e| FlipscanError::io(context(), e))?;

    debug!(path = %path.display(), rows = rows.len(), "Wrote CSV");
    Ok(())
}

/// One JSON object per line.
pub fn write_jsonl<R: Serialize>(path: &Path, records: &[R]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| FlipscanError::io(format!("creating {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{line}").map_err(|e| FlipscanError::io("writing JSONL line", e))?;
    }
    writer
        .flush()
        .map_err(|e| FlipscanError::io("flushing JSONL", e))?;

    debug!(path = %path.display(), records = records.len(), "Wrote JSONL");
    Ok(())
}

/// Pretty-printed JSON document.
pub fn write_meta<M: Serialize>(path: &Path, meta: &M) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(path, json + "\n").map_err(|e| FlipscanError::io(format!("writing {}", path.display()), e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| FlipscanError::io(format!("creating {}", parent.display()), e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct ScoreRow {
        address: String,
        #[serde(serialize_with = "serialize_score")]
        score: f64,
    }

    impl CsvRow for ScoreRow {
        const HEADER: &'static [&'static str] = &["address", "score"];
    }

    #[derive(Deserialize)]
    struct ScoreBack {
        address: String,
        score: f64,
    }

    #[test]
    fn test_csv_round_trip_within_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/scores.csv");
        let rows = vec![
            ScoreRow { address: "0xaaa".into(), score: 1.0 / 3.0 },
            ScoreRow { address: "0xbbb".into(), score: 12.5 },
        ];
        write_csv(&path, &rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("address,score\n"));
        assert!(text.contains("0xbbb,12.50000000"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<ScoreBack> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back.len(), 2);
        for (orig, read) in rows.iter().zip(&back) {
            assert_eq!(orig.address, read.address);
            assert!((orig.score - read.score).abs() < 1e-8);
        }
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv::<ScoreRow>(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "address,score\n");
    }

    #[test]
    fn test_jsonl_one_record_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        write_jsonl(&path, &[serde_json::json!({"a": 1}), serde_json::json!({"a": 2})]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"a":2}"#]);
    }

    #[test]
    fn test_meta_is_pretty_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep/er/meta.json");
        write_meta(&path, &serde_json::json!({"epoch": 5})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"epoch\": 5"));
    }
}
