//! Converter configuration.
//!
//! Every field has a default, so an absent or partial TOML file is valid:
//!
//! ```toml
//! [oracle]
//! model = "claude-sonnet-4-5-20250929"
//!
//! [pipeline]
//! lines_per_chunk = 80
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Config {
    /// Load from a TOML file, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.pipeline.validate()?;
        Ok(config)
    }
}

/// Reasoning-oracle connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl OracleConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", self.api_key_env)))
    }
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

/// Knobs of the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Lines sent to format inference.
    #[serde(default = "default_sample_lines")]
    pub sample_lines: usize,
    /// Leading lines repeated at the top of every chunk.
    #[serde(default = "default_header_lines")]
    pub header_lines: usize,
    /// Data lines per chunk.
    #[serde(default = "default_lines_per_chunk")]
    pub lines_per_chunk: usize,
    /// Documents with more lines than this are extracted in chunks.
    #[serde(default = "default_chunk_threshold_lines")]
    pub chunk_threshold_lines: usize,
    #[serde(default = "default_csv_min_confidence")]
    pub csv_min_confidence: f32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Encodings preferred when they score close to the best candidate.
    #[serde(default = "default_priority_encodings")]
    pub priority_encodings: Vec<String>,
    /// Send PDFs to the oracle as documents instead of extracted text.
    #[serde(default = "default_true")]
    pub pdf_vision: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_lines: default_sample_lines(),
            header_lines: default_header_lines(),
            lines_per_chunk: default_lines_per_chunk(),
            chunk_threshold_lines: default_chunk_threshold_lines(),
            csv_min_confidence: default_csv_min_confidence(),
            min_confidence: default_min_confidence(),
            priority_encodings: default_priority_encodings(),
            pdf_vision: default_true(),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.sample_lines == 0 || self.lines_per_chunk == 0 {
            return Err(Error::Config(
                "sample_lines and lines_per_chunk must be positive".to_string(),
            ));
        }
        for confidence in [self.csv_min_confidence, self.min_confidence] {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(Error::Config(format!(
                    "confidence threshold {} is outside 0..1",
                    confidence
                )));
            }
        }
        Ok(())
    }
}

fn default_sample_lines() -> usize {
    50
}

fn default_header_lines() -> usize {
    20
}

fn default_lines_per_chunk() -> usize {
    100
}

fn default_chunk_threshold_lines() -> usize {
    120
}

fn default_csv_min_confidence() -> f32 {
    0.5
}

fn default_min_confidence() -> f32 {
    0.7
}

fn default_priority_encodings() -> Vec<String> {
    vec!["windows-1250".to_string(), "ISO-8859-2".to_string()]
}

fn default_true() -> bool {
    true
}
