//! On-disk persistence for a job's lookup cache.
//!
//! Each job keeps one JSON document at `<job_dir>/metadata/lookup_cache.json`.
//! Saves go through a sibling temp file and a rename so an interrupted write
//! leaves the previous document intact.
//!
//! The helpers at the bottom give read-only callers access to a job's cache
//! without constructing a [`LookupCacheManager`](crate::manager::LookupCacheManager).

use anyhow::{Context, Result};
use lookup_cache_core::models::{LookupCache, LookupCacheEntry};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Relative location of the cache file inside a job directory.
pub const CACHE_RELATIVE_PATH: &str = "metadata/lookup_cache.json";

/// Path of the cache file for `job_dir`.
pub fn resolve_path(job_dir: &Path) -> PathBuf {
    job_dir.join(CACHE_RELATIVE_PATH)
}

/// Write `cache` to `path`, creating parent directories as needed.
pub fn save_cache(cache: &LookupCache, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&cache.to_record())?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace cache file: {}", path.display()))?;
    Ok(())
}

/// Read the cache at `path`.
///
/// A missing file yields an empty cache. An unreadable or corrupt file is an
/// error.
pub fn load_cache(path: &Path) -> Result<LookupCache> {
    if !path.exists() {
        return Ok(LookupCache::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
    let record: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;
    LookupCache::from_record(&record)
}

/// Load the cache for `job_dir`, or `None` when there is no usable file.
pub fn load_for_job(job_dir: &Path) -> Option<LookupCache> {
    let path = resolve_path(job_dir);
    if !path.exists() {
        return None;
    }
    match load_cache(&path) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable lookup cache");
            None
        }
    }
}

/// Look up one word in the cache of `job_dir`.
pub fn lookup_word_from_job(job_dir: &Path, word: &str) -> Option<LookupCacheEntry> {
    load_for_job(job_dir).and_then(|cache| cache.get(word).cloned())
}
