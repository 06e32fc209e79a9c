//! Batch lookup orchestrator.
//!
//! Turns a list of normalized words into cache entries by asking the LLM
//! for definitions in fixed-size batches.
//!
//! # Pipeline
//!
//! ```text
//! words ──▶ drop already-cached ──▶ chunk(batch_size)
//!                                        │
//!            ┌───────────────────────────┘
//!            ▼
//!   lookup_batch ── request_json (transport attempts, timeout, validator)
//!            │        └─ failure ──▶ BatchRetry, fixed sleep, retry batch
//!            ▼
//!   parse_batch_items ──▶ on_batch callback ──▶ BatchCompleted
//! ```
//!
//! Batches run strictly in order. A batch that exhausts its attempts
//! contributes no entries and its last error is kept; the run continues with
//! the next batch.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use lookup_cache_core::models::{LookupCache, LookupCacheEntry};
use lookup_cache_core::protocol::{
    build_system_prompt, build_user_payload, is_valid_payload, parse_batch_items,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::{JsonRequest, LlmClient, RequestOptions};
use crate::progress::{LookupProgressEvent, LookupProgressReporter};

/// Entries resolved by one batch, keyed by normalized word.
pub type BatchEntries = BTreeMap<String, LookupCacheEntry>;

/// Limits and languages for a lookup run.
#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub batch_size: usize,
    pub response_attempts: u32,
    pub retry_delay: Duration,
    pub transport_attempts: u32,
    pub timeout: Duration,
    pub input_language: String,
    pub definition_language: String,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            response_attempts: 3,
            retry_delay: Duration::from_secs(1),
            transport_attempts: 3,
            timeout: Duration::from_secs(45),
            input_language: String::new(),
            definition_language: String::new(),
        }
    }
}

impl LookupOptions {
    pub fn from_config(config: &Config, input_language: &str, definition_language: &str) -> Self {
        Self {
            batch_size: config.lookup.batch_size,
            response_attempts: config.lookup.response_attempts,
            retry_delay: config.lookup.retry_delay(),
            transport_attempts: config.llm.transport_attempts,
            timeout: config.llm.timeout(),
            input_language: input_language.to_string(),
            definition_language: definition_language.to_string(),
        }
    }
}

/// Result of one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub entries: BatchEntries,
    /// Last error when every attempt failed.
    pub error: Option<String>,
    pub elapsed: Duration,
    pub attempts: u32,
}

/// Look up one batch, retrying the whole batch with a fixed delay until a
/// valid payload arrives or the attempts run out.
pub async fn lookup_batch(
    client: &dyn LlmClient,
    words: &[String],
    options: &LookupOptions,
    progress: &dyn LookupProgressReporter,
    batch_no: usize,
) -> BatchOutcome {
    let started = Instant::now();
    let mut outcome = BatchOutcome::default();
    if words.is_empty() {
        return outcome;
    }

    let request = JsonRequest {
        label: format!("lookup-batch-{}", batch_no),
        system_prompt: build_system_prompt(&options.input_language, &options.definition_language),
        user_payload: build_user_payload(
            words,
            &options.input_language,
            &options.definition_language,
        ),
    };
    let request_options = RequestOptions {
        transport_attempts: options.transport_attempts,
        timeout: options.timeout,
        validator: is_valid_payload,
    };
    let max_attempts = options.response_attempts.max(1);

    for attempt in 1..=max_attempts {
        outcome.attempts = attempt;
        match client.request_json(&request, &request_options).await {
            Ok(payload) => {
                outcome.entries = parse_batch_items(
                    &payload,
                    words,
                    &options.input_language,
                    &options.definition_language,
                );
                outcome.error = None;
                debug!(
                    batch = batch_no,
                    attempt,
                    words = words.len(),
                    entries = outcome.entries.len(),
                    "batch resolved"
                );
                break;
            }
            Err(e) => {
                let error = e.to_string();
                warn!(
                    batch = batch_no,
                    attempt,
                    max_attempts,
                    error = %error,
                    "batch attempt failed"
                );
                progress.report(LookupProgressEvent::BatchRetry {
                    batch: batch_no,
                    attempt,
                    max_attempts,
                    error: error.clone(),
                });
                outcome.error = Some(error);
                if attempt < max_attempts {
                    tokio::time::sleep(options.retry_delay).await;
                }
            }
        }
    }

    outcome.elapsed = started.elapsed();
    outcome
}

/// Summary of a multi-batch lookup run.
#[derive(Debug, Default)]
pub struct LookupRun {
    /// Every entry resolved during the run.
    pub entries: BatchEntries,
    /// Batches sent to the LLM.
    pub llm_calls: u64,
    pub batches: usize,
    pub failed_batches: usize,
    /// Sum of the per-batch lookup times; callback time is not included.
    pub elapsed: Duration,
    /// Last error of every failed batch, in batch order.
    pub errors: Vec<String>,
}

/// Look up `words` in batches.
///
/// Words already present in `existing` are skipped before batching.
/// `on_batch` sees each batch's entries as soon as the batch finishes, and a
/// [`LookupProgressEvent::BatchCompleted`] event follows every batch.
pub async fn lookup_words(
    client: &dyn LlmClient,
    words: &[String],
    existing: Option<&LookupCache>,
    options: &LookupOptions,
    mut on_batch: Option<&mut dyn FnMut(&BatchEntries)>,
    progress: &dyn LookupProgressReporter,
) -> LookupRun {
    let mut run = LookupRun::default();

    let pending: Vec<String> = words
        .iter()
        .filter(|word| !existing.map(|cache| cache.contains(word)).unwrap_or(false))
        .cloned()
        .collect();
    if pending.is_empty() {
        return run;
    }

    let batch_size = options.batch_size.max(1);
    let batches_total = pending.len().div_ceil(batch_size);
    info!(
        words = pending.len(),
        batches = batches_total,
        model = client.model_name(),
        "starting lookup"
    );

    for (index, batch) in pending.chunks(batch_size).enumerate() {
        let batch_no = index + 1;
        let outcome = lookup_batch(client, batch, options, progress, batch_no).await;
        run.llm_calls += 1;
        run.batches += 1;
        run.elapsed += outcome.elapsed;

        if let Some(error) = outcome.error {
            run.failed_batches += 1;
            run.errors.push(error);
        }
        if let Some(callback) = on_batch.as_mut() {
            callback(&outcome.entries);
        }
        run.entries.extend(outcome.entries);

        progress.report(LookupProgressEvent::BatchCompleted {
            batches_done: batch_no,
            batches_total,
            words_queued: pending.len(),
            words_cached: run.entries.len(),
            llm_calls: run.llm_calls,
        });
    }

    info!(
        entries = run.entries.len(),
        failed_batches = run.failed_batches,
        elapsed_ms = run.elapsed.as_millis() as u64,
        "lookup finished"
    );
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use lookup_cache_core::models::LookupResult;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Answers every item with a definition derived from the word, and
    /// records the words of each request.
    struct EchoClient {
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl EchoClient {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for EchoClient {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn request_json(
            &self,
            request: &JsonRequest,
            _options: &RequestOptions,
        ) -> Result<Value> {
            let words: Vec<String> = request.user_payload["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item["word"].as_str().unwrap().to_string())
                .collect();
            let items: Vec<Value> = words
                .iter()
                .enumerate()
                .map(|(id, word)| {
                    json!({"id": id, "word": word, "definition": format!("def of {}", word)})
                })
                .collect();
            self.seen.lock().unwrap().push(words);
            Ok(json!({ "items": items }))
        }
    }

    /// Fails a fixed number of times, then echoes.
    struct FlakyClient {
        failures_left: Mutex<u32>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        fn model_name(&self) -> &str {
            "flaky"
        }

        async fn request_json(
            &self,
            request: &JsonRequest,
            options: &RequestOptions,
        ) -> Result<Value> {
            *self.calls.lock().unwrap() += 1;
            {
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    bail!("LLM request timed out after 45.0s");
                }
            }
            EchoClient::new().request_json(request, options).await
        }
    }

    struct RecordingProgress {
        events: Mutex<Vec<LookupProgressEvent>>,
    }

    impl LookupProgressReporter for RecordingProgress {
        fn report(&self, event: LookupProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{}", i)).collect()
    }

    fn fast_options(batch_size: usize) -> LookupOptions {
        LookupOptions {
            batch_size,
            retry_delay: Duration::from_millis(1),
            input_language: "Spanish".to_string(),
            definition_language: "English".to_string(),
            ..LookupOptions::default()
        }
    }

    #[tokio::test]
    async fn test_batches_cover_words_in_order() {
        let client = EchoClient::new();
        let input = words(23);
        let run = lookup_words(&client, &input, None, &fast_options(10), None, &NoProgress).await;

        let seen = client.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].len(), 10);
        assert_eq!(seen[2].len(), 3);
        assert_eq!(seen.concat(), input);
        assert_eq!(run.llm_calls, 3);
        assert_eq!(run.entries.len(), 23);
        assert_eq!(run.entries["word7"].lookup_result.definition, "def of word7");
    }

    #[tokio::test]
    async fn test_existing_words_are_not_requested() {
        let client = EchoClient::new();
        let mut cache = LookupCache::new("job", "Spanish", "English");
        cache.add(
            LookupCacheEntry::new("word1", "Spanish", "English", LookupResult::with_definition("x"))
                .unwrap(),
        );
        let run = lookup_words(
            &client,
            &words(3),
            Some(&cache),
            &fast_options(10),
            None,
            &NoProgress,
        )
        .await;
        assert_eq!(client.seen.lock().unwrap()[0], vec!["word0", "word2"]);
        assert_eq!(run.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let client = EchoClient::new();
        let run = lookup_words(&client, &[], None, &fast_options(10), None, &NoProgress).await;
        assert_eq!(run.llm_calls, 0);
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_callback_sees_each_batch() {
        let client = EchoClient::new();
        let mut sizes = Vec::new();
        {
            let callback: &mut dyn FnMut(&BatchEntries) = &mut |entries| sizes.push(entries.len());
            lookup_words(&client, &words(5), None, &fast_options(2), Some(callback), &NoProgress)
                .await;
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    /// Echoes after a fixed delay.
    struct SlowClient {
        delay: Duration,
    }

    #[async_trait]
    impl LlmClient for SlowClient {
        fn model_name(&self) -> &str {
            "slow"
        }

        async fn request_json(
            &self,
            request: &JsonRequest,
            options: &RequestOptions,
        ) -> Result<Value> {
            tokio::time::sleep(self.delay).await;
            EchoClient::new().request_json(request, options).await
        }
    }

    #[tokio::test]
    async fn test_run_elapsed_sums_batches_without_callback_time() {
        let client = SlowClient {
            delay: Duration::from_millis(20),
        };
        let callback: &mut dyn FnMut(&BatchEntries) =
            &mut |_| std::thread::sleep(Duration::from_millis(150));
        let run = lookup_words(
            &client,
            &words(4),
            None,
            &fast_options(2),
            Some(callback),
            &NoProgress,
        )
        .await;
        assert_eq!(run.batches, 2);
        assert!(run.elapsed >= Duration::from_millis(40));
        assert!(run.elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_batch_retries_then_succeeds() {
        let client = FlakyClient {
            failures_left: Mutex::new(2),
            calls: Mutex::new(0),
        };
        let progress = RecordingProgress {
            events: Mutex::new(Vec::new()),
        };
        let outcome = lookup_batch(&client, &words(2), &fast_options(10), &progress, 1).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.entries.len(), 2);
        let retries = progress
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, LookupProgressEvent::BatchRetry { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_exhausted_batch_reports_error_and_run_continues() {
        let client = FlakyClient {
            failures_left: Mutex::new(3),
            calls: Mutex::new(0),
        };
        let run = lookup_words(&client, &words(4), None, &fast_options(2), None, &NoProgress).await;
        assert_eq!(run.batches, 2);
        assert_eq!(run.failed_batches, 1);
        assert!(run.errors[0].contains("timed out"));
        assert_eq!(run.entries.len(), 2);
        assert!(run.entries.contains_key("word2"));
        assert_eq!(*client.calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_progress_after_every_batch() {
        let client = EchoClient::new();
        let progress = RecordingProgress {
            events: Mutex::new(Vec::new()),
        };
        lookup_words(&client, &words(3), None, &fast_options(2), None, &progress).await;
        let events = progress.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            LookupProgressEvent::BatchCompleted {
                batches_done: 2,
                batches_total: 2,
                words_queued: 3,
                words_cached: 3,
                llm_calls: 2,
            }
        );
    }
}
