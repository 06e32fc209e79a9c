//! `lkc build` and `lkc link` commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use lookup_cache_core::timing::parse_timing_tracks;

use crate::config::Config;
use crate::llm;
use crate::manager::{BuildOptions, LookupCacheManager};
use crate::progress::ProgressMode;

/// Overrides taken from the `build` command line.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub input_language: Option<String>,
    pub definition_language: Option<String>,
    pub batch_size: Option<usize>,
    pub min_word_length: Option<usize>,
    pub keep_stopwords: bool,
    pub progress: Option<String>,
}

/// Read sentences from a JSON array of strings or from plain text with one
/// sentence per line. Blank lines are ignored.
pub fn read_sentences(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sentences file: {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        let sentences: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sentences file: {}", path.display()))?;
        return Ok(sentences);
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub async fn run_build(
    config: &Config,
    job_id: &str,
    sentences_path: &Path,
    args: &BuildArgs,
) -> Result<()> {
    if !config.llm.is_enabled() {
        bail!("LLM provider is disabled. Set [llm] provider in config.");
    }

    let sentences = read_sentences(sentences_path)?;
    let client = llm::create_client(&config.llm)?;
    let reporter = ProgressMode::parse(args.progress.as_deref()).reporter();

    let mut options = BuildOptions::from_config(config);
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            bail!("--batch-size must be > 0");
        }
        options.lookup.batch_size = batch_size;
    }
    if let Some(min_word_length) = args.min_word_length {
        options.min_word_length = min_word_length.max(1);
    }
    if args.keep_stopwords {
        options.skip_stopwords = false;
    }

    let definition_language = args
        .definition_language
        .as_deref()
        .or(config.lookup.definition_language.as_deref());
    let mut manager = LookupCacheManager::new(
        config.job_dir(job_id),
        job_id,
        args.input_language.as_deref(),
        definition_language,
    );
    if manager.cache().input_language.is_empty() {
        bail!("input language unknown for job '{}': pass --input-language", job_id);
    }
    if manager.cache().definition_language.is_empty() {
        bail!(
            "definition language unknown for job '{}': pass --definition-language or set lookup.definition_language",
            job_id
        );
    }

    let added = manager
        .build_from_sentences(&sentences, client.as_ref(), &options, reporter.as_ref())
        .await;

    let summary = manager.to_summary();
    let stats = manager.cache().stats.clone();
    println!("build {}", job_id);
    println!("  sentences: {}", sentences.len());
    println!("  new entries: {}", added);
    println!("  total words: {}", summary.word_count);
    println!("  llm calls: {}", stats.llm_calls);
    println!("  skipped stopwords: {}", stats.skipped_stopwords);
    println!("  cache: {}", manager.path().display());

    Ok(())
}

pub fn run_link(config: &Config, job_id: &str, timing_path: &Path, chunk_id: &str) -> Result<()> {
    let content = std::fs::read_to_string(timing_path)
        .with_context(|| format!("Failed to read timing file: {}", timing_path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse timing file: {}", timing_path.display()))?;
    let tracks = parse_timing_tracks(&document);

    let mut manager = LookupCacheManager::new(config.job_dir(job_id), job_id, None, None);
    let added = manager.link_audio_references(&tracks, chunk_id);
    if added > 0 {
        manager.save()?;
    }

    println!("link {} (chunk {})", job_id, chunk_id);
    println!("  tracks: {}", tracks.len());
    println!("  references added: {}", added);
    println!(
        "  total references: {}",
        manager.cache().stats.total_audio_refs
    );

    Ok(())
}
