//! Timing-track tokens consumed by audio-reference linking.
//!
//! Timing tokens come from the speech pipeline and have gone through several
//! field-name conventions over time. Each canonical field is resolved from an
//! ordered list of accepted keys; the first key present with a usable value
//! wins.

use std::collections::BTreeMap;

use serde_json::Value;

const TEXT_KEYS: &[&str] = &["text", "word", "token", "w"];
const START_KEYS: &[&str] = &["start", "t0", "startTime", "start_time", "begin"];
const END_KEYS: &[&str] = &["end", "t1", "endTime", "end_time"];
const SENTENCE_KEYS: &[&str] = &[
    "sentenceIdx",
    "sentence_idx",
    "sentenceId",
    "sentence_id",
    "sentenceIndex",
    "sentence_index",
];
const TOKEN_KEYS: &[&str] = &[
    "tokenIdx",
    "token_idx",
    "tokenId",
    "token_id",
    "tokenIndex",
    "token_index",
    "wordIdx",
    "word_idx",
];

/// One timed token, with every field in its canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingToken {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub sentence_idx: u32,
    pub token_idx: u32,
}

fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

fn as_index(value: &Value) -> Option<u32> {
    as_f64(value)
        .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u32::MAX as f64)
        .map(|f| f as u32)
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

fn first_of<T>(
    record: &Value,
    keys: &[&str],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(&convert))
}

impl TimingToken {
    /// Resolve a raw token record.
    ///
    /// Returns `None` when the text or either time is missing. Missing
    /// sentence/token indices default to 0.
    pub fn from_value(record: &Value) -> Option<Self> {
        let text = first_of(record, TEXT_KEYS, |v| {
            v.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })?;
        Some(Self {
            text,
            start: first_of(record, START_KEYS, as_f64)?,
            end: first_of(record, END_KEYS, as_f64)?,
            sentence_idx: first_of(record, SENTENCE_KEYS, as_index).unwrap_or(0),
            token_idx: first_of(record, TOKEN_KEYS, as_index).unwrap_or(0),
        })
    }

    /// A token spans no audio when `end <= start` at the millisecond
    /// precision audio references are stored with.
    pub fn is_degenerate(&self) -> bool {
        round_ms(self.end) <= round_ms(self.start)
    }
}

/// Parse a `{track: [token, ...]}` document, dropping unusable tokens.
pub fn parse_timing_tracks(document: &Value) -> BTreeMap<String, Vec<TimingToken>> {
    let mut tracks = BTreeMap::new();
    if let Some(obj) = document.as_object() {
        for (track, tokens) in obj {
            let parsed: Vec<TimingToken> = tokens
                .as_array()
                .map(|list| list.iter().filter_map(TimingToken::from_value).collect())
                .unwrap_or_default();
            tracks.insert(track.clone(), parsed);
        }
    }
    tracks
}
