//! Wire and domain types for Idena flips.
//!
//! The API is loosely typed: numbers sometimes arrive as strings, flags as
//! integers. Wire structs accept both and normalize; everything past this
//! module works on [`FlipRecord`] only.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Epoch number. Scopes every query.
pub type Epoch = u64;

/// Response envelope shared by every Idena API endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub result: Option<Value>,

    #[serde(rename = "continuationToken", default)]
    pub continuation_token: Option<String>,

    #[serde(default)]
    pub error: Option<Value>,
}

impl Envelope {
    /// `error.message` when the service reported a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()?
            .get("message")?
            .as_str()
            .filter(|m| !m.is_empty())
    }

    /// Cursor for the next page; an empty token ends pagination.
    pub fn next_cursor(&self) -> Option<&str> {
        self.continuation_token
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

/// Word pair attached to a flip.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlipWords {
    #[serde(default)]
    pub word1: Option<FlipWord>,
    #[serde(default)]
    pub word2: Option<FlipWord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlipWord {
    #[serde(default)]
    pub name: Option<String>,
}

/// Flip fields as returned by `/Epoch/{n}/Flips` items and `/Flip/{cid}` results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipFields {
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub grade_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub grade: Option<i64>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub wrong_words: bool,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub wrong_words_votes: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub short_resp_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub long_resp_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub with_private_part: Option<bool>,
    #[serde(default)]
    pub words: Option<FlipWords>,
}

/// Item of `/Epoch/{n}/Authors/Bad`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadAuthorEntry {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub wrong_words: bool,
}

impl BadAuthorEntry {
    /// Reason string the API uses for wrong-words penalties.
    pub const WRONG_WORDS_REASON: &'static str = "WrongWords";

    /// Lowercased address, `None` when blank.
    pub fn normalized_address(&self) -> Option<String> {
        normalize_address(self.address.as_deref())
    }

    /// Whether this entry disqualifies its author for wrong words.
    pub fn is_wrong_words(&self) -> bool {
        self.wrong_words || self.reason.as_deref() == Some(Self::WRONG_WORDS_REASON)
    }
}

/// One flip, normalized.
///
/// Immutable once built. Identified by `cid`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipRecord {
    pub cid: String,
    /// Lowercase address, empty when the API did not say
    pub author: String,
    pub grade_score: f64,
    pub grade: Option<i64>,
    pub status: String,
    /// One offense per flip when true; votes are informational
    pub wrong_words: bool,
    pub wrong_words_votes: Option<i64>,
    pub short_resp_count: Option<i64>,
    pub long_resp_count: Option<i64>,
    pub with_private_part: Option<bool>,
    pub word1: String,
    pub word2: String,
}

impl FlipRecord {
    /// Normalize wire fields. `cid` overrides the field's own cid when the
    /// caller already knows it (detail lookups).
    pub fn from_fields(cid: Option<&str>, fields: FlipFields) -> Self {
        let (word1, word2) = match fields.words {
            Some(words) => (
                words.word1.and_then(|w| w.name).unwrap_or_default(),
                words.word2.and_then(|w| w.name).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        Self {
            cid: cid
                .map(str::to_string)
                .or(fields.cid)
                .unwrap_or_default(),
            author: normalize_address(fields.author.as_deref()).unwrap_or_default(),
            grade_score: fields.grade_score.unwrap_or(0.0),
            grade: fields.grade,
            status: fields.status.unwrap_or_default(),
            wrong_words: fields.wrong_words,
            wrong_words_votes: fields.wrong_words_votes,
            short_resp_count: fields.short_resp_count,
            long_resp_count: fields.long_resp_count,
            with_private_part: fields.with_private_part,
            word1,
            word2,
        }
    }
}

/// Lowercase and trim an address; blank becomes `None`.
pub fn normalize_address(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => Some(b),
        _ => None,
    })
}

// Truthy: `true`, any non-zero number, or the string "true".
fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}
