use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use lookup_cache::llm::{JsonRequest, LlmClient, RequestOptions};
use lookup_cache::lookup::LookupOptions;
use lookup_cache::manager::{BuildOptions, LookupCacheManager};
use lookup_cache::progress::NoProgress;
use lookup_cache::store;
use lookup_cache_core::timing::parse_timing_tracks;
use serde_json::{json, Value};
use tempfile::TempDir;

fn lkc_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lkc");
    path
}

fn fast_options(batch_size: usize) -> BuildOptions {
    BuildOptions {
        lookup: LookupOptions {
            batch_size,
            retry_delay: Duration::from_millis(5),
            timeout: Duration::from_millis(200),
            ..LookupOptions::default()
        },
        ..BuildOptions::default()
    }
}

/// Answers with one fixed payload and counts requests.
struct FixedClient {
    payload: Value,
    requests: Mutex<Vec<Value>>,
}

#[async_trait]
impl LlmClient for FixedClient {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn request_json(
        &self,
        request: &JsonRequest,
        _options: &RequestOptions,
    ) -> Result<Value> {
        self.requests.lock().unwrap().push(request.user_payload.clone());
        Ok(self.payload.clone())
    }
}

/// Never answers within the timeout.
struct TimeoutClient {
    requests: Mutex<u32>,
}

#[async_trait]
impl LlmClient for TimeoutClient {
    fn model_name(&self) -> &str {
        "timeout"
    }

    async fn request_json(
        &self,
        _request: &JsonRequest,
        options: &RequestOptions,
    ) -> Result<Value> {
        *self.requests.lock().unwrap() += 1;
        bail!(
            "LLM request timed out after {:.1}s",
            options.timeout.as_secs_f64()
        )
    }
}

/// Echoes every word back with a definition, one batch at a time, and
/// records the on-disk entry count seen at the start of each request.
struct EchoClient {
    cache_path: PathBuf,
    on_disk_counts: Mutex<Vec<usize>>,
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
        let on_disk = store::load_cache(&self.cache_path)?.len();
        self.on_disk_counts.lock().unwrap().push(on_disk);
        let items: Vec<Value> = request.user_payload["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| json!({"id": item["id"], "word": item["word"], "definition": "defined"}))
            .collect();
        Ok(json!({ "items": items }))
    }
}

#[tokio::test]
async fn test_arabic_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let mut manager =
        LookupCacheManager::new(tmp.path(), "job-ar", Some("Arabic"), Some("English"));
    let client = FixedClient {
        payload: json!({"items": [{"id": 0, "word": "مرحبا", "definition": "hello"}]}),
        requests: Mutex::new(Vec::new()),
    };

    let added = manager
        .build_from_sentences(&["مرحبا بالعالم"], &client, &fast_options(10), &NoProgress)
        .await;

    assert_eq!(added, 1);
    let entry = manager.get("مرحبا").unwrap();
    assert_eq!(entry.lookup_result.definition, "hello");
    assert_eq!(entry.input_language, "Arabic");

    let requests = client.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["items"][0]["word"], "مرحبا");

    let on_disk = store::lookup_word_from_job(tmp.path(), "مَرْحَبا").unwrap();
    assert_eq!(on_disk.lookup_result.definition, "hello");
}

#[tokio::test]
async fn test_timeouts_leave_cache_empty_but_count_calls() {
    let tmp = TempDir::new().unwrap();
    let mut manager = LookupCacheManager::new(tmp.path(), "job", Some("english"), Some("Spanish"));
    let client = TimeoutClient {
        requests: Mutex::new(0),
    };

    let added = manager
        .build_from_sentences(
            &["cat dog bird fish", "horse mouse"],
            &client,
            &fast_options(4),
            &NoProgress,
        )
        .await;

    assert_eq!(added, 0);
    assert_eq!(manager.cache().stats.llm_calls, 2);
    assert!(manager.cache().is_empty());
    // Three whole-batch attempts per batch.
    assert_eq!(*client.requests.lock().unwrap(), 6);
}

#[tokio::test]
async fn test_cache_is_saved_after_every_batch() {
    let tmp = TempDir::new().unwrap();
    let cache_path = store::resolve_path(tmp.path());
    let mut manager = LookupCacheManager::new(tmp.path(), "job", Some("english"), Some("Spanish"));
    let client = EchoClient {
        cache_path: cache_path.clone(),
        on_disk_counts: Mutex::new(Vec::new()),
    };

    let added = manager
        .build_from_sentences(
            &["cat dog bird", "fish horse"],
            &client,
            &fast_options(2),
            &NoProgress,
        )
        .await;

    assert_eq!(added, 5);
    assert_eq!(*client.on_disk_counts.lock().unwrap(), vec![0, 2, 4]);
    assert_eq!(store::load_cache(&cache_path).unwrap().len(), 5);
}

#[tokio::test]
async fn test_build_then_link_audio() {
    let tmp = TempDir::new().unwrap();
    let mut manager = LookupCacheManager::new(tmp.path(), "job", Some("english"), Some("Spanish"));
    let client = FixedClient {
        payload: json!({"items": [
            {"id": 0, "definition": "gato"},
            {"id": 1, "definition": "alfombra"}
        ]}),
        requests: Mutex::new(Vec::new()),
    };
    manager
        .build_from_sentences(&["The cat on the mat"], &client, &fast_options(10), &NoProgress)
        .await;

    let tracks = parse_timing_tracks(&json!({
        "original": [
            {"text": "The", "start": 0.0, "end": 0.2, "sentenceIdx": 0, "tokenIdx": 0},
            {"word": "cat", "t0": 0.2, "t1": 0.5, "sentence_idx": 0, "token_idx": 1},
            {"token": "mat.", "startTime": 1.0, "endTime": 1.4, "sentenceId": 0, "wordIdx": 4},
            {"text": "cat", "start": 2.0, "end": 2.0, "sentenceIdx": 1, "tokenIdx": 0}
        ]
    }));
    assert_eq!(manager.link_audio_references(&tracks, "chunk-0"), 2);
    assert_eq!(manager.link_audio_references(&tracks, "chunk-0"), 0);
    manager.save().unwrap();

    let saved = store::load_for_job(tmp.path()).unwrap();
    let mat = saved.get("mat").unwrap();
    assert_eq!(mat.audio_references.len(), 1);
    assert_eq!(mat.audio_references[0].token_idx, 4);
    assert_eq!(saved.stats.total_audio_refs, 2);
}

// ============ CLI ============

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let jobs_root = root.join("jobs");

    let config_content = format!(
        r#"[storage]
jobs_root = "{}"

[lookup]
batch_size = 5
"#,
        jobs_root.display()
    );
    let config_path = config_dir.join("lkc.toml");
    fs::write(&config_path, config_content).unwrap();

    let cache = json!({
        "job_id": "job-1",
        "input_language": "Spanish",
        "definition_language": "English",
        "entries": {
            "hola": {
                "word": "Hola",
                "word_normalized": "hola",
                "input_language": "Spanish",
                "definition_language": "English",
                "lookup_result": {"type": "word", "definition": "hello"},
                "audio_references": [],
                "created_at": "2024-01-01T00:00:00Z"
            }
        },
        "stats": {"total_words": 1},
        "version": "1.0"
    });
    let cache_path = store::resolve_path(&jobs_root.join("job-1"));
    fs::create_dir_all(cache_path.parent().unwrap()).unwrap();
    fs::write(&cache_path, cache.to_string()).unwrap();

    (tmp, config_path)
}

fn run_lkc(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lkc_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lkc binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_cli_summary() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_lkc(&config, &["summary", "job-1"]);
    assert!(success, "summary failed: {}", stderr);
    let summary: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["available"], true);
    assert_eq!(summary["word_count"], 1);
    assert_eq!(summary["input_language"], "Spanish");
}

#[test]
fn test_cli_missing_job_is_unavailable() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_lkc(&config, &["get", "nope", "hola"]);
    assert!(success);
    let response: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["available"], false);
    assert!(response["entry"].is_null());
}

#[test]
fn test_cli_get_and_bulk() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, success) = run_lkc(&config, &["get", "job-1", "¡Hola!"]);
    assert!(success);
    let response: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["normalized"], "hola");
    assert_eq!(response["entry"]["lookup_result"]["definition"], "hello");

    let (stdout, _, success) = run_lkc(&config, &["bulk", "job-1", "hola", "adios"]);
    assert!(success);
    let response: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["hits"], 1);
    assert_eq!(response["misses"], 1);
    assert!(response["results"]["adios"].is_null());
}

#[test]
fn test_cli_export() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_lkc(&config, &["export", "job-1"]);
    assert!(success);
    let response: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["cache"]["entries"]["hola"]["word"], "Hola");
}

#[test]
fn test_cli_link() {
    let (tmp, config) = setup_test_env();
    let timing_path = tmp.path().join("timing.json");
    fs::write(
        &timing_path,
        json!({"translation": [
            {"text": "hola", "start": 0.1234, "end": 0.5, "sentence_idx": 0, "token_idx": 0}
        ]})
        .to_string(),
    )
    .unwrap();

    let (stdout, stderr, success) = run_lkc(
        &config,
        &["link", "job-1", "--timing", timing_path.to_str().unwrap(), "--chunk", "c0"],
    );
    assert!(success, "link failed: {}", stderr);
    assert!(stdout.contains("references added: 1"));

    let (stdout, _, _) = run_lkc(&config, &["get", "job-1", "hola"]);
    let response: Value = serde_json::from_str(&stdout).unwrap();
    let reference = &response["entry"]["audio_references"][0];
    assert_eq!(reference["chunk_id"], "c0");
    assert_eq!(reference["start"], 0.123);
}

#[test]
fn test_cli_build_with_disabled_llm_fails() {
    let (tmp, config) = setup_test_env();
    let sentences = tmp.path().join("sentences.txt");
    fs::write(&sentences, "hola mundo\n").unwrap();
    let (_, stderr, success) = run_lkc(
        &config,
        &["build", "job-1", "--sentences", sentences.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_cli_bad_config() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[storage]\njobs_root = \"x\"\n[lookup]\nbatch_size = 0\n").unwrap();
    let (_, stderr, success) = run_lkc(&bad, &["summary", "job-1"]);
    assert!(!success);
    assert!(stderr.contains("batch_size"));
}
