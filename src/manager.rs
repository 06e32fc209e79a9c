//! Per-job cache manager.
//!
//! [`LookupCacheManager`] is the facade the rest of the application uses:
//! it lazily loads (or creates) the job's cache, runs incremental builds,
//! links audio references, and persists the result.
//!
//! The manager assumes a single writer per job. Callers serialize builds
//! and link passes for the same job.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use lookup_cache_core::models::{AudioRef, LookupCache, LookupCacheEntry};
use lookup_cache_core::timing::TimingToken;
use lookup_cache_core::tokenize::{count_skipped_stopwords, extract_unique_words};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::LlmClient;
use crate::lookup::{lookup_words, BatchEntries, LookupOptions};
use crate::progress::LookupProgressReporter;
use crate::store;

/// Knobs for [`LookupCacheManager::build_from_sentences`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Batch and transport limits. Languages are taken from the cache.
    pub lookup: LookupOptions,
    pub skip_stopwords: bool,
    pub min_word_length: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            lookup: LookupOptions::default(),
            skip_stopwords: true,
            min_word_length: 1,
        }
    }
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookup: LookupOptions::from_config(config, "", ""),
            skip_stopwords: config.lookup.skip_stopwords,
            min_word_length: config.lookup.min_word_length,
        }
    }
}

/// Status shape reported to external callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSummary {
    pub available: bool,
    pub word_count: usize,
    pub audio_ref_count: usize,
    pub input_language: String,
    pub definition_language: String,
    pub version: String,
}

pub struct LookupCacheManager {
    job_dir: PathBuf,
    job_id: String,
    input_language: Option<String>,
    definition_language: Option<String>,
    cache: Option<LookupCache>,
}

impl LookupCacheManager {
    pub fn new(
        job_dir: impl Into<PathBuf>,
        job_id: &str,
        input_language: Option<&str>,
        definition_language: Option<&str>,
    ) -> Self {
        Self {
            job_dir: job_dir.into(),
            job_id: job_id.to_string(),
            input_language: input_language.map(str::to_string),
            definition_language: definition_language.map(str::to_string),
            cache: None,
        }
    }

    pub fn path(&self) -> PathBuf {
        store::resolve_path(&self.job_dir)
    }

    /// The job's cache, loaded from disk on first access.
    ///
    /// A load failure starts a fresh cache. Constructor languages only fill
    /// blank languages and never replace ones already recorded.
    pub fn cache(&mut self) -> &mut LookupCache {
        if self.cache.is_none() {
            let loaded = self.load_or_create();
            self.cache = Some(loaded);
        }
        self.cache.get_or_insert_with(LookupCache::default)
    }

    fn load_or_create(&self) -> LookupCache {
        let path = self.path();
        let mut cache = match store::load_cache(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(
                    job = %self.job_id,
                    path = %path.display(),
                    error = %e,
                    "failed to load lookup cache, starting fresh"
                );
                LookupCache::default()
            }
        };
        if cache.job_id.is_empty() {
            cache.job_id = self.job_id.clone();
        }
        if cache.input_language.is_empty() {
            if let Some(ref language) = self.input_language {
                cache.input_language = language.clone();
            }
        }
        if cache.definition_language.is_empty() {
            if let Some(ref language) = self.definition_language {
                cache.definition_language = language.clone();
            }
        }
        cache
    }

    pub fn get(&mut self, word: &str) -> Option<&LookupCacheEntry> {
        self.cache().get(word)
    }

    /// Look up several words; every query word appears in the result.
    pub fn get_bulk<S: AsRef<str>>(
        &mut self,
        words: &[S],
    ) -> BTreeMap<String, Option<LookupCacheEntry>> {
        let cache = self.cache();
        words
            .iter()
            .map(|word| (word.as_ref().to_string(), cache.get(word.as_ref()).cloned()))
            .collect()
    }

    pub fn add_entry(&mut self, entry: LookupCacheEntry) {
        self.cache().add(entry);
    }

    pub fn add_entries<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = LookupCacheEntry>,
    {
        self.cache().add_entries(entries);
    }

    /// Recompute derived stats and write the cache to disk.
    pub fn save(&mut self) -> Result<()> {
        let path = self.path();
        let cache = self.cache();
        cache.update_stats();
        store::save_cache(cache, &path)
    }

    /// Look up every uncached word in `sentences` and add the results.
    ///
    /// The cache is saved after every batch so an interrupted build keeps
    /// everything resolved so far. Failed batches and failed saves are
    /// logged and skipped. Returns the number of new entries.
    pub async fn build_from_sentences<S: AsRef<str>>(
        &mut self,
        sentences: &[S],
        client: &dyn LlmClient,
        options: &BuildOptions,
        progress: &dyn LookupProgressReporter,
    ) -> usize {
        let started = Instant::now();
        let path = self.path();
        let job_id = self.job_id.clone();
        let cache = self.cache();

        let words = extract_unique_words(
            sentences,
            Some(&*cache),
            &cache.input_language,
            options.skip_stopwords,
            options.min_word_length,
        );
        if words.is_empty() {
            info!(job = %job_id, "no new words to look up");
            return 0;
        }
        if options.skip_stopwords {
            let skipped = count_skipped_stopwords(
                sentences,
                Some(&*cache),
                &cache.input_language,
                options.min_word_length,
            );
            cache.stats.skipped_stopwords += skipped as u64;
        }

        let mut lookup = options.lookup.clone();
        lookup.input_language = cache.input_language.clone();
        lookup.definition_language = cache.definition_language.clone();

        let before = cache.len();
        let run = {
            let on_batch: &mut dyn FnMut(&BatchEntries) = &mut |entries| {
                cache.add_entries(entries.values().cloned());
                cache.update_stats();
                if let Err(e) = store::save_cache(cache, &path) {
                    warn!(job = %job_id, error = %e, "incremental save failed");
                }
            };
            lookup_words(client, &words, None, &lookup, Some(on_batch), progress).await
        };

        for (key, entry) in run.entries {
            if !cache.contains(&key) {
                cache.add(entry);
            }
        }

        cache.stats.llm_calls += run.llm_calls;
        cache.stats.build_time_seconds += started.elapsed().as_secs_f64();
        cache.update_stats();
        if let Err(e) = store::save_cache(cache, &path) {
            warn!(job = %job_id, error = %e, "final save failed");
        }

        let added = cache.len().saturating_sub(before);
        info!(
            job = %job_id,
            added,
            failed_batches = run.failed_batches,
            llm_calls = run.llm_calls,
            "lookup cache build finished"
        );
        added
    }

    /// Attach audio references for every timing token whose word is cached.
    ///
    /// Tokens with no cached word or with `end <= start` are skipped.
    /// Returns the number of references appended.
    pub fn link_audio_references(
        &mut self,
        timing_tracks: &BTreeMap<String, Vec<TimingToken>>,
        chunk_id: &str,
    ) -> usize {
        let cache = self.cache();
        let mut added = 0;

        for (track, tokens) in timing_tracks {
            for token in tokens {
                if token.is_degenerate() {
                    continue;
                }
                let entry = match cache.get_mut(&token.text) {
                    Some(entry) => entry,
                    None => continue,
                };
                let reference = AudioRef {
                    chunk_id: chunk_id.to_string(),
                    sentence_idx: token.sentence_idx,
                    token_idx: token.token_idx,
                    track: track.clone(),
                    start: token.start,
                    end: token.end,
                };
                if entry.add_audio_reference(reference) {
                    added += 1;
                }
            }
        }

        cache.update_stats();
        added
    }

    pub fn to_summary(&mut self) -> CacheSummary {
        let available = self.path().exists();
        let cache = self.cache();
        CacheSummary {
            available: available || !cache.is_empty(),
            word_count: cache.len(),
            audio_ref_count: cache.total_audio_refs(),
            input_language: cache.input_language.clone(),
            definition_language: cache.definition_language.clone(),
            version: cache.version.clone(),
        }
    }
}
