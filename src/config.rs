/// Configuration module for billsift.
///
/// Handles loading, validating, and providing default configuration values.
/// Credentials never live in the file; each service names the environment
/// variables that hold its endpoint and key.
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::section::SectionLabel;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_extraction_endpoint_env() -> String {
    "AZURE_ENDPOINT".to_string()
}

fn default_extraction_key_env() -> String {
    "AZURE_API_KEY".to_string()
}

fn default_model_id() -> String {
    "prebuilt-layout".to_string()
}

fn default_extraction_api_version() -> String {
    "2024-11-30".to_string()
}

fn default_completion_endpoint_env() -> String {
    "OPENAI_ENDPOINT".to_string()
}

fn default_completion_key_env() -> String {
    "AZURE_OPENAI_API_KEY".to_string()
}

fn default_deployment() -> String {
    "gpt-4o-mini".to_string()
}

fn default_completion_api_version() -> String {
    "2024-08-01-preview".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_timeout_secs() -> u64 {
    300
}

fn default_classify_prefix_chars() -> usize {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_min_confidence() -> f32 {
    0.8
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionConfig {
    /// Overrides the endpoint environment variable when non-empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,

    #[serde(default = "default_extraction_endpoint_env")]
    pub endpoint_env: String,

    #[serde(default = "default_extraction_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_extraction_api_version")]
    pub api_version: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,

    #[serde(default = "default_completion_endpoint_env")]
    pub endpoint_env: String,

    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_deployment")]
    pub deployment: String,

    #[serde(default = "default_completion_api_version")]
    pub api_version: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Characters of each chunk sent to the classifier.
    #[serde(default = "default_classify_prefix_chars")]
    pub classify_prefix_chars: usize,

    /// Maximum completion requests in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub unrecognized_label: UnrecognizedLabelPolicy,

    /// Drop page headers, footers and page numbers before classification.
    #[serde(default = "default_true")]
    pub skip_page_furniture: bool,

    #[serde(default)]
    pub confidence_filter: ConfidenceFilter,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-label replacements for the built-in summary instructions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub section_instructions: BTreeMap<SectionLabel, String>,
}

/// What to do with a chunk whose classifier reply is not a known label.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnrecognizedLabelPolicy {
    /// Bucket under [`SectionLabel::Other`].
    #[default]
    Fallback,
    /// Discard the chunk.
    Drop,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfidenceFilter {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            endpoint_env: default_extraction_endpoint_env(),
            api_key_env: default_extraction_key_env(),
            model_id: default_model_id(),
            api_version: default_extraction_api_version(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            endpoint_env: default_completion_endpoint_env(),
            api_key_env: default_completion_key_env(),
            deployment: default_deployment(),
            api_version: default_completion_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classify_prefix_chars: default_classify_prefix_chars(),
            concurrency: default_concurrency(),
            unrecognized_label: UnrecognizedLabelPolicy::default(),
            skip_page_furniture: default_true(),
            confidence_filter: ConfidenceFilter::default(),
            retry: RetryConfig::default(),
            section_instructions: BTreeMap::new(),
        }
    }
}

impl Default for ConfidenceFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and generates a
    /// template file when the default path was used.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid config: {path}"))?;

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        anyhow::ensure!(
            p.classify_prefix_chars > 0,
            "pipeline.classify_prefix_chars must be positive"
        );
        anyhow::ensure!(p.concurrency > 0, "pipeline.concurrency must be positive");
        anyhow::ensure!(
            p.retry.max_attempts > 0,
            "pipeline.retry.max_attempts must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&p.confidence_filter.min_confidence),
            "pipeline.confidence_filter.min_confidence must be within [0, 1]"
        );
        for (label, text) in &p.section_instructions {
            anyhow::ensure!(
                !text.trim().is_empty(),
                "pipeline.section_instructions.{label} must not be empty"
            );
        }
        anyhow::ensure!(
            self.extraction.timeout_secs > 0 && self.completion.timeout_secs > 0,
            "timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.extraction.poll_timeout_secs > 0,
            "extraction.poll_timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.extraction.poll_interval_ms > 0,
            "extraction.poll_interval_ms must be positive"
        );
        Ok(())
    }
}

impl ExtractionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn resolve_endpoint(&self) -> Result<String, ServiceError> {
        resolve_endpoint(&self.endpoint, &self.endpoint_env)
    }

    pub fn resolve_api_key(&self) -> Result<String, ServiceError> {
        read_env(&self.api_key_env)
    }
}

impl CompletionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolve_endpoint(&self) -> Result<String, ServiceError> {
        resolve_endpoint(&self.endpoint, &self.endpoint_env)
    }

    pub fn resolve_api_key(&self) -> Result<String, ServiceError> {
        read_env(&self.api_key_env)
    }
}

impl PipelineConfig {
    /// Summary instructions for `label`, honoring config overrides.
    #[must_use]
    pub fn instructions_for(&self, label: SectionLabel) -> &str {
        self.section_instructions
            .get(&label)
            .map_or_else(|| label.default_instructions(), String::as_str)
    }
}

// ── Environment helpers ──────────────────────────────────────────────

fn resolve_endpoint(explicit: &str, env_name: &str) -> Result<String, ServiceError> {
    let endpoint = if explicit.is_empty() {
        read_env(env_name)?
    } else {
        explicit.to_string()
    };
    Ok(endpoint.trim_end_matches('/').to_string())
}

fn read_env(name: &str) -> Result<String, ServiceError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ServiceError::MissingCredential(format!(
            "environment variable {name} is not set"
        ))),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
