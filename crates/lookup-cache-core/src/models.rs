//! Data model for the word-lookup cache.
//!
//! A [`LookupCache`] belongs to one job and maps normalized words to
//! [`LookupCacheEntry`] values. Each entry carries the structured
//! [`LookupResult`] produced by the LLM plus the [`AudioRef`]s pointing at
//! every spoken occurrence of the word.
//!
//! # Record format
//!
//! [`LookupCache::to_record`] produces the on-disk JSON document:
//!
//! ```text
//! {
//!   "job_id": "...",
//!   "input_language": "...",
//!   "definition_language": "...",
//!   "entries": { "<normalized>": { ...entry... }, ... },   // sorted by key
//!   "stats": { ... },
//!   "version": "1.0"
//! }
//! ```
//!
//! Audio reference times are rounded to millisecond precision when written.
//! [`LookupCache::from_record`] is tolerant: malformed entries are dropped
//! instead of failing the whole document.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::tokenize::normalize_word;

/// Current on-disk format version.
pub const CACHE_VERSION: &str = "1.0";

fn round_ms<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 1000.0).round() / 1000.0)
}

/// One spoken occurrence of a word inside a chunk's audio track.
///
/// Identity is `(chunk_id, sentence_idx, token_idx, track)`; the times are
/// payload and do not take part in deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRef {
    pub chunk_id: String,
    pub sentence_idx: u32,
    pub token_idx: u32,
    pub track: String,
    #[serde(serialize_with = "round_ms")]
    pub start: f64,
    #[serde(serialize_with = "round_ms")]
    pub end: f64,
}

impl AudioRef {
    /// Returns true when both references point at the same spoken token.
    pub fn same_position(&self, other: &AudioRef) -> bool {
        self.chunk_id == other.chunk_id
            && self.sentence_idx == other.sentence_idx
            && self.token_idx == other.token_idx
            && self.track == other.track
    }
}

/// A cognate or equivalent of the word in a related language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedLanguage {
    pub language: String,
    pub word: String,
    #[serde(default)]
    pub transliteration: Option<String>,
}

/// Structured dictionary result for one word.
///
/// Every optional field is always present in the serialized form; absent
/// values are written as `null`, never as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub definition: String,
    #[serde(default)]
    pub part_of_speech: Option<String>,
    #[serde(default)]
    pub pronunciation: Option<String>,
    #[serde(default)]
    pub etymology: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub example_translation: Option<String>,
    #[serde(default)]
    pub example_transliteration: Option<String>,
    #[serde(default)]
    pub idioms: Option<Vec<String>>,
    #[serde(default)]
    pub related_languages: Option<Vec<RelatedLanguage>>,
}

fn default_kind() -> String {
    "word".to_string()
}

impl LookupResult {
    /// A result with only a definition set.
    pub fn with_definition(definition: impl Into<String>) -> Self {
        Self {
            kind: default_kind(),
            definition: definition.into(),
            part_of_speech: None,
            pronunciation: None,
            etymology: None,
            example: None,
            example_translation: None,
            example_transliteration: None,
            idioms: None,
            related_languages: None,
        }
    }
}

/// One cached definition, keyed in the cache by `word_normalized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupCacheEntry {
    pub word: String,
    #[serde(default)]
    pub word_normalized: String,
    #[serde(default)]
    pub input_language: String,
    #[serde(default)]
    pub definition_language: String,
    pub lookup_result: LookupResult,
    #[serde(default)]
    pub audio_references: Vec<AudioRef>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl LookupCacheEntry {
    /// Build an entry for `word`, deriving the normalized key.
    ///
    /// Fails when the definition is blank or the word normalizes to nothing:
    /// such entries must never reach the cache.
    pub fn new(
        word: &str,
        input_language: &str,
        definition_language: &str,
        lookup_result: LookupResult,
    ) -> Result<Self> {
        let word_normalized = normalize_word(word);
        if word_normalized.is_empty() {
            bail!("word {:?} normalizes to an empty key", word);
        }
        if lookup_result.definition.trim().is_empty() {
            bail!("empty definition for {:?}", word);
        }
        Ok(Self {
            word: word.to_string(),
            word_normalized,
            input_language: input_language.to_string(),
            definition_language: definition_language.to_string(),
            lookup_result,
            audio_references: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// Append `reference` unless one with the same position already exists.
    ///
    /// Returns true if the reference was appended.
    pub fn add_audio_reference(&mut self, reference: AudioRef) -> bool {
        if self
            .audio_references
            .iter()
            .any(|existing| existing.same_position(&reference))
        {
            return false;
        }
        self.audio_references.push(reference);
        true
    }
}

/// Aggregate counters for a cache.
///
/// `total_words` and `total_audio_refs` are derived by
/// [`LookupCache::update_stats`]; the other counters accumulate across
/// incremental builds and are only ever increased by the build pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupCacheStats {
    pub total_words: usize,
    pub total_audio_refs: usize,
    pub llm_calls: u64,
    pub build_time_seconds: f64,
    pub skipped_stopwords: u64,
}

/// Job-scoped word-lookup cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupCache {
    pub job_id: String,
    pub input_language: String,
    pub definition_language: String,
    entries: BTreeMap<String, LookupCacheEntry>,
    pub stats: LookupCacheStats,
    pub version: String,
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl LookupCache {
    pub fn new(job_id: &str, input_language: &str, definition_language: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            input_language: input_language.to_string(),
            definition_language: definition_language.to_string(),
            entries: BTreeMap::new(),
            stats: LookupCacheStats::default(),
            version: CACHE_VERSION.to_string(),
        }
    }

    /// Look up a word in any surface form.
    pub fn get(&self, word: &str) -> Option<&LookupCacheEntry> {
        self.entries.get(&normalize_word(word))
    }

    /// Mutable lookup, re-normalizing like [`get`](Self::get).
    pub fn get_mut(&mut self, word: &str) -> Option<&mut LookupCacheEntry> {
        self.entries.get_mut(&normalize_word(word))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains_key(&normalize_word(word))
    }

    /// Insert or overwrite an entry under its normalized key.
    ///
    /// The key is always re-normalized, from `word_normalized` when set and
    /// from `word` otherwise, and written back into the entry.
    pub fn add(&mut self, mut entry: LookupCacheEntry) {
        let source = if entry.word_normalized.trim().is_empty() {
            &entry.word
        } else {
            &entry.word_normalized
        };
        entry.word_normalized = normalize_word(source);
        if entry.word_normalized.is_empty() {
            return;
        }
        self.entries.insert(entry.word_normalized.clone(), entry);
    }

    pub fn add_entries<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = LookupCacheEntry>,
    {
        for entry in entries {
            self.add(entry);
        }
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &LookupCacheEntry> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_audio_refs(&self) -> usize {
        self.entries.values().map(|e| e.audio_references.len()).sum()
    }

    /// Recompute the derived counters from the entry set.
    pub fn update_stats(&mut self) {
        self.stats.total_words = self.entries.len();
        self.stats.total_audio_refs = self.total_audio_refs();
    }

    pub fn to_record(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuild a cache from its record, dropping malformed entries.
    ///
    /// Fails only when `record` is not a JSON object.
    pub fn from_record(record: &Value) -> Result<Self> {
        let obj = match record.as_object() {
            Some(obj) => obj,
            None => bail!("lookup cache record must be a JSON object"),
        };

        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let mut cache = LookupCache::new(
            &text("job_id"),
            &text("input_language"),
            &text("definition_language"),
        );
        let version = text("version");
        if !version.is_empty() {
            cache.version = version;
        }
        cache.stats = obj
            .get("stats")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        if let Some(entries) = obj.get("entries").and_then(Value::as_object) {
            for (key, value) in entries {
                let mut entry: LookupCacheEntry = match serde_json::from_value(value.clone()) {
                    Ok(entry) => entry,
                    Err(_) => continue,
                };
                if entry.lookup_result.definition.trim().is_empty() {
                    continue;
                }
                if entry.word_normalized.is_empty() {
                    entry.word_normalized = normalize_word(key);
                }
                cache.add(entry);
            }
        }

        Ok(cache)
    }
}
