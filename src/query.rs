//! Read-only access to a job's lookup cache.
//!
//! Serves the four query operations used by the `lkc` read commands (and by
//! any API layer embedding the library): full export, summary, single-word
//! lookup and bulk lookup. None of them fail when the job has no cache file;
//! they report `available: false` instead.

use std::collections::BTreeMap;

use anyhow::Result;
use lookup_cache_core::models::{LookupCache, LookupCacheEntry, CACHE_VERSION};
use lookup_cache_core::tokenize::normalize_word;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::manager::CacheSummary;
use crate::store;

/// Full cache document for offline export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResponse {
    pub available: bool,
    pub job_id: String,
    pub cache: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WordLookupResponse {
    pub available: bool,
    pub word: String,
    pub normalized: String,
    pub entry: Option<LookupCacheEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkLookupResponse {
    pub available: bool,
    /// Query word → entry, `null` for misses.
    pub results: BTreeMap<String, Option<LookupCacheEntry>>,
    pub hits: usize,
    pub misses: usize,
}

fn load(config: &Config, job_id: &str) -> Option<LookupCache> {
    store::load_for_job(&config.job_dir(job_id))
}

pub fn export_job(config: &Config, job_id: &str) -> ExportResponse {
    let cache = load(config, job_id);
    ExportResponse {
        available: cache.is_some(),
        job_id: job_id.to_string(),
        cache: cache.map(|c| c.to_record()),
    }
}

pub fn summarize_job(config: &Config, job_id: &str) -> CacheSummary {
    match load(config, job_id) {
        Some(cache) => CacheSummary {
            available: true,
            word_count: cache.len(),
            audio_ref_count: cache.total_audio_refs(),
            input_language: cache.input_language,
            definition_language: cache.definition_language,
            version: cache.version,
        },
        None => CacheSummary {
            available: false,
            word_count: 0,
            audio_ref_count: 0,
            input_language: String::new(),
            definition_language: String::new(),
            version: CACHE_VERSION.to_string(),
        },
    }
}

pub fn lookup_job_word(config: &Config, job_id: &str, word: &str) -> WordLookupResponse {
    let cache = load(config, job_id);
    WordLookupResponse {
        available: cache.is_some(),
        word: word.to_string(),
        normalized: normalize_word(word),
        entry: cache.and_then(|c| c.get(word).cloned()),
    }
}

pub fn bulk_lookup_job<S: AsRef<str>>(
    config: &Config,
    job_id: &str,
    words: &[S],
) -> BulkLookupResponse {
    let cache = load(config, job_id);
    let results: BTreeMap<String, Option<LookupCacheEntry>> = words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            let entry = cache.as_ref().and_then(|c| c.get(word).cloned());
            (word.to_string(), entry)
        })
        .collect();
    let hits = results.values().filter(|entry| entry.is_some()).count();

    BulkLookupResponse {
        available: cache.is_some(),
        misses: results.len() - hits,
        hits,
        results,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_export(config: &Config, job_id: &str) -> Result<()> {
    print_json(&export_job(config, job_id))
}

pub fn run_summary(config: &Config, job_id: &str) -> Result<()> {
    print_json(&summarize_job(config, job_id))
}

pub fn run_get(config: &Config, job_id: &str, word: &str) -> Result<()> {
    print_json(&lookup_job_word(config, job_id, word))
}

pub fn run_bulk(config: &Config, job_id: &str, words: &[String]) -> Result<()> {
    print_json(&bulk_lookup_job(config, job_id, words))
}
