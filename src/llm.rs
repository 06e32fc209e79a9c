//! LLM client abstraction and implementations.
//!
//! Defines the [`LlmClient`] trait used by the batch orchestrator and the
//! concrete clients:
//! - **[`DisabledClient`]**: always errors; used when no provider is configured.
//! - **[`OpenAiCompatClient`]**: calls an OpenAI-compatible
//!   `POST /v1/chat/completions` endpoint (OpenAI itself, or a local Ollama).
//!
//! # Request contract
//!
//! [`LlmClient::request_json`] returns a JSON payload only if it passes the
//! caller's validator. The client makes up to `transport_attempts` attempts,
//! and the whole call, retries included, is bounded by `timeout`.
//!
//! # Retry Strategy
//!
//! Within one request the OpenAI-compatible client retries:
//! - network errors, HTTP 429 and 5xx → retry after 0.5s, 1s, 2s, ...
//! - HTTP 4xx (not 429) → fail immediately
//! - replies that do not decode to JSON or fail validation → retry
//!
//! # Diagnostics
//!
//! When a diagnostics directory is configured, every call writes one JSON
//! artifact holding the request, the raw reply, any error, and the timing.
//! Artifact writes never affect the call's outcome.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lookup_cache_core::protocol::extract_json_payload;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::LlmConfig;

/// One JSON-mode chat request.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    /// Short tag used in logs and diagnostics (e.g. `"lookup-batch-3"`).
    pub label: String,
    pub system_prompt: String,
    pub user_payload: Value,
}

/// Per-request limits and the payload gate.
#[derive(Clone)]
pub struct RequestOptions {
    pub transport_attempts: u32,
    pub timeout: Duration,
    pub validator: fn(&Value) -> bool,
}

/// A text-generation service that answers with JSON.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Send `request` and return the first reply payload accepted by
    /// `options.validator`.
    async fn request_json(&self, request: &JsonRequest, options: &RequestOptions)
        -> Result<Value>;
}

/// Instantiate the client selected by `config.provider`.
pub fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledClient)),
        "openai" | "ollama" => Ok(Box::new(OpenAiCompatClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Disabled Client ============

/// A client that refuses every request.
pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn request_json(
        &self,
        _request: &JsonRequest,
        _options: &RequestOptions,
    ) -> Result<Value> {
        bail!("LLM provider is disabled. Set [llm] provider in config.")
    }
}

// ============ OpenAI-compatible Client ============

/// Chat-completions client for OpenAI and OpenAI-compatible servers.
///
/// The bearer token is read from the environment variable named by
/// `llm.api_key_env`; it is required for `openai` and optional for `ollama`.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    diagnostics: Option<DiagnosticsSink>,
}

impl OpenAiCompatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| {
                anyhow::anyhow!("llm.model required for provider '{}'", config.provider)
            })?;

        let api_key = std::env::var(&config.api_key_env).ok();
        if config.provider == "openai" && api_key.is_none() {
            bail!("{} environment variable not set", config.api_key_env);
        }

        let base_url = config.url.clone().unwrap_or_else(|| match config.provider.as_str() {
            "ollama" => "http://localhost:11434".to_string(),
            _ => "https://api.openai.com".to_string(),
        });

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            model,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            diagnostics: config.diagnostics_dir.clone().map(DiagnosticsSink::new),
        })
    }

    fn request_body(&self, request: &JsonRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_payload.to_string()}
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        })
    }

    async fn attempt_loop(
        &self,
        request: &JsonRequest,
        body: &Value,
        options: &RequestOptions,
        last_reply: &mut Option<String>,
    ) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..options.transport_attempts {
            if attempt > 0 {
                let delay = Duration::from_millis(500 << (attempt - 1).min(4));
                tokio::time::sleep(delay).await;
            }

            let mut builder = self
                .http
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(ref key) = self.api_key {
                builder = builder.header("Authorization", format!("Bearer {}", key));
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(label = %request.label, attempt, error = %e, "LLM transport error");
                    last_err = Some(anyhow::anyhow!("LLM connection error: {}", e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                let snippet: String = body_text.chars().take(200).collect();
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(
                        label = %request.label,
                        attempt,
                        status = status.as_u16(),
                        "LLM API error, retrying"
                    );
                    last_err = Some(anyhow::anyhow!("LLM API error {}: {}", status, snippet));
                    continue;
                }
                bail!("LLM API error {}: {}", status, snippet);
            }

            let json: Value = match response.json().await {
                Ok(json) => json,
                Err(e) => {
                    last_err = Some(anyhow::anyhow!("invalid LLM response body: {}", e));
                    continue;
                }
            };
            let content = json
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            *last_reply = Some(content.clone());

            match extract_json_payload(&content) {
                Some(payload) if (options.validator)(&payload) => return Ok(payload),
                Some(_) => {
                    debug!(label = %request.label, attempt, "LLM payload rejected by validator");
                    last_err = Some(anyhow::anyhow!("LLM payload failed validation"));
                }
                None => {
                    debug!(label = %request.label, attempt, "LLM reply is not JSON");
                    last_err = Some(anyhow::anyhow!("LLM reply is not valid JSON"));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM request failed after retries")))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn request_json(&self, request: &JsonRequest, options: &RequestOptions) -> Result<Value> {
        let body = self.request_body(request);
        let started = Instant::now();
        let mut last_reply = None;

        let result = match tokio::time::timeout(
            options.timeout,
            self.attempt_loop(request, &body, options, &mut last_reply),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "LLM request timed out after {:.1}s",
                options.timeout.as_secs_f64()
            )),
        };

        if let Some(ref sink) = self.diagnostics {
            sink.record(&Diagnostic {
                label: &request.label,
                model: &self.model,
                request: &body,
                response: last_reply.as_deref(),
                error: result.as_ref().err().map(|e| e.to_string()),
                elapsed: started.elapsed(),
            });
        }

        result
    }
}

// ============ Diagnostics ============

/// One request/response record written for offline inspection.
pub struct Diagnostic<'a> {
    pub label: &'a str,
    pub model: &'a str,
    pub request: &'a Value,
    pub response: Option<&'a str>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Writes one JSON file per LLM call into a directory.
pub struct DiagnosticsSink {
    dir: PathBuf,
}

impl DiagnosticsSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Write `diagnostic`; failures are logged and otherwise ignored.
    pub fn record(&self, diagnostic: &Diagnostic<'_>) {
        if let Err(e) = self.try_record(diagnostic) {
            debug!(dir = %self.dir.display(), error = %e, "failed to write LLM diagnostic");
        }
    }

    fn try_record(&self, diagnostic: &Diagnostic<'_>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let now = chrono::Utc::now();
        let path = self.dir.join(format!(
            "{}-{}.json",
            now.format("%Y%m%dT%H%M%S%.3f"),
            uuid::Uuid::new_v4()
        ));
        let artifact = json!({
            "label": diagnostic.label,
            "model": diagnostic.model,
            "request": diagnostic.request,
            "response": diagnostic.response,
            "error": diagnostic.error,
            "elapsed_ms": diagnostic.elapsed.as_millis() as u64,
            "created_at": now.to_rfc3339(),
        });
        std::fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;
        Ok(path)
    }
}
