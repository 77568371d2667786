//! Configuration for the translation pipeline.
//!
//! Settings normally come from the host's settings store; the CLI reads them
//! from a JSON file and lets environment variables override the secrets.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubtitleError};

/// LLM provider backing the translation calls
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Default for Provider {
    fn default() -> Self {
        Self::OpenAi
    }
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Model used when the settings do not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.0-flash",
        }
    }
}

impl FromStr for Provider {
    type Err = SubtitleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(SubtitleError::Configuration(format!("Unknown provider: {}", other))),
        }
    }
}

/// Settings for the LLM orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Feature toggle; a disabled pipeline fails fast with a configuration error
    pub enabled: bool,
    pub provider: Provider,
    /// Empty means the provider's default model
    pub model: String,
    pub api_key: String,
    pub source_language: String,
    pub target_language: String,
    pub temperature: f32,
    /// Extra attempts after a network failure or timeout
    pub max_retries: u32,
    /// Extra attempts after an unparseable or misaligned response
    pub max_validation_retries: u32,
    pub request_timeout_ms: u64,
    pub max_output_tokens: u32,
    /// Window of source audio covered by one LLM call
    pub max_batch_duration_ms: u64,
    /// Pause between consecutive batch requests
    pub inter_batch_delay_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: Provider::default(),
            model: String::new(),
            api_key: String::new(),
            source_language: "English".to_string(),
            target_language: "Simplified Chinese".to_string(),
            temperature: 0.3,
            max_retries: 2,
            max_validation_retries: 1,
            request_timeout_ms: 120_000,
            max_output_tokens: 16_384,
            max_batch_duration_ms: 600_000,
            inter_batch_delay_ms: 500,
        }
    }
}

impl TranslationConfig {
    /// Model name with the provider default applied
    pub fn effective_model(&self) -> String {
        if self.model.trim().is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.trim().to_string()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Checks that must pass before any network call is made
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Err(SubtitleError::Configuration("Subtitle translation is disabled".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(SubtitleError::Configuration(format!(
                "{} API key is required for translation",
                self.provider.as_str()
            )));
        }
        if self.max_batch_duration_ms == 0 {
            return Err(SubtitleError::Configuration("max_batch_duration_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings for the translation cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_size_bytes: u64,
    pub auto_evict: bool,
    /// Directory for the file-backed store; `None` keeps the cache in memory
    pub cache_dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            max_size_bytes: 100 * 1024 * 1024, // 100 MB
            auto_evict: true,
            cache_dir: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub translation: TranslationConfig,
    pub cache: CacheConfig,
}

impl PipelineConfig {
    /// Read configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `LECTURE_SUBS_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(key) = std::env::var("LECTURE_SUBS_API_KEY") {
            self.translation.api_key = key;
        }
        if let Ok(provider) = std::env::var("LECTURE_SUBS_PROVIDER") {
            self.translation.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("LECTURE_SUBS_MODEL") {
            self.translation.model = model;
        }
        Ok(self)
    }
}
