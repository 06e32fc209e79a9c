//! TOML configuration.
//!
//! The configuration is parsed once at startup by [`load_config`] and the
//! resulting [`Config`] is passed explicitly to everything that needs it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per job.
    pub jobs_root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LookupConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_response_attempts")]
    pub response_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub skip_stopwords: bool,
    #[serde(default = "default_min_word_length")]
    pub min_word_length: usize,
    #[serde(default)]
    pub definition_language: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            response_attempts: default_response_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            skip_stopwords: true,
            min_word_length: default_min_word_length(),
            definition_language: None,
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_response_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_min_word_length() -> usize {
    1
}

impl LookupConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_transport_attempts")]
    pub transport_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            transport_attempts: default_transport_attempts(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            diagnostics_dir: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_transport_attempts() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    45
}
fn default_temperature() -> f32 {
    0.2
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// In-memory configuration rooted at `jobs_root`, with every other
    /// section at its defaults and the LLM disabled.
    pub fn minimal(jobs_root: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                jobs_root: jobs_root.into(),
            },
            lookup: LookupConfig::default(),
            llm: LlmConfig::default(),
        }
    }

    /// Directory of the job named `job_id`.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.storage.jobs_root.join(job_id)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.lookup.batch_size == 0 {
        anyhow::bail!("lookup.batch_size must be > 0");
    }
    if config.lookup.response_attempts == 0 {
        anyhow::bail!("lookup.response_attempts must be >= 1");
    }
    if config.lookup.min_word_length == 0 {
        anyhow::bail!("lookup.min_word_length must be >= 1");
    }
    if config.llm.transport_attempts == 0 {
        anyhow::bail!("llm.transport_attempts must be >= 1");
    }
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.llm.is_enabled() && config.llm.model.is_none() {
        anyhow::bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    Ok(())
}
