//! Configuration structures for the claim extraction pipeline.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration for the claimocr pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// LLM service configuration.
    pub llm: LlmConfig,

    /// Result extraction configuration.
    pub extraction: ExtractionConfig,

    /// Model configuration.
    pub models: ModelConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Target languages. Each must be covered by the Korean PP-OCR
    /// recognition model (see [`OcrConfig::SUPPORTED_LANGUAGES`]); the list
    /// does not pick a model, `models.recognition_model` does.
    pub languages: Vec<String>,

    /// Sort fragments top-to-bottom, left-to-right before returning them.
    pub reading_order: bool,

    /// Keep `[UNK]` tokens emitted by the recognizer instead of blanking them.
    pub keep_unk: bool,

    /// Maximum image dimension (longer side); larger photos are downscaled. 0 disables.
    pub max_image_size: u32,
}

impl OcrConfig {
    /// Languages the Korean recognition dictionary covers (Hangul, Latin, digits).
    pub const SUPPORTED_LANGUAGES: [&'static str; 2] = ["ko", "en"];

    /// Check the OCR section on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.len() < 2 {
            return Err(ConfigError::Invalid {
                key: "ocr.languages".to_string(),
                reason: "at least two target languages are required".to_string(),
            });
        }
        if let Some(lang) = self
            .languages
            .iter()
            .find(|l| !Self::SUPPORTED_LANGUAGES.contains(&l.as_str()))
        {
            return Err(ConfigError::Invalid {
                key: "ocr.languages".to_string(),
                reason: format!(
                    "'{}' is not covered by the recognition model (supported: {})",
                    lang,
                    Self::SUPPORTED_LANGUAGES.join(", ")
                ),
            });
        }
        Ok(())
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: vec!["ko".to_string(), "en".to_string()],
            reading_order: true,
            keep_unk: false,
            max_image_size: 4096,
        }
    }
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Gemini `generateContent` API.
    #[default]
    Gemini,
    /// OpenAI-compatible chat completions API.
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            other => Err(ConfigError::Invalid {
                key: "llm.provider".to_string(),
                reason: format!("unknown provider '{}'", other),
            }),
        }
    }
}

impl LlmProvider {
    /// Default API endpoint for the provider.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// LLM service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which API to talk to.
    pub provider: LlmProvider,

    /// Model identifier sent with every request.
    pub model: String,

    /// API endpoint; provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key; read from the provider's environment variable when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation temperature.
    pub temperature: f32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Caller-level retry policy.
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: "gemini-3-pro-preview".to_string(),
            endpoint: None,
            api_key: None,
            temperature: 0.0,
            timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Endpoint to use, falling back to the provider default.
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply environment variable overrides from the process environment.
    ///
    /// Supported env vars:
    /// - `CLAIMOCR_LLM_PROVIDER`: "gemini" (default) or "openai"
    /// - `CLAIMOCR_LLM_MODEL`: model identifier
    /// - `CLAIMOCR_LLM_ENDPOINT`: API endpoint
    /// - `GOOGLE_API_KEY` / `OPENAI_API_KEY`: key for the selected provider,
    ///   used only when no key is configured
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(provider) =
            lookup("CLAIMOCR_LLM_PROVIDER").and_then(|p| p.parse::<LlmProvider>().ok())
        {
            self.provider = provider;
        }
        if let Some(model) = lookup("CLAIMOCR_LLM_MODEL") {
            self.model = model;
        }
        if let Some(endpoint) = lookup("CLAIMOCR_LLM_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if self.api_key.is_none() {
            self.api_key = lookup(self.provider.api_key_env()).filter(|k| !k.trim().is_empty());
        }
        self
    }

    /// The configured API key, or an error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey(self.provider.api_key_env()))
    }
}

/// Bounded retry with exponential backoff for transient LLM failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first; 1 disables retrying.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Upper bound for a single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

/// Result extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Skip the LLM call when OCR found no text and return an empty record.
    pub skip_llm_on_empty: bool,

    /// Strip separators from the account number after flagging them.
    pub normalize_account_number: bool,

    /// Extra mission lines appended to the extraction prompt.
    pub extra_instructions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            skip_llm_on_empty: true,
            normalize_account_number: false,
            extra_instructions: Vec::new(),
        }
    }
}

/// Model file paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name (PP-OCR Korean covers Hangul and Latin).
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "korean_rec.onnx".to_string(),
            dictionary: "korean_dict.txt".to_string(),
        }
    }
}

impl ClaimConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }

    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ocr.validate()?;
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "llm.model".to_string(),
                reason: "model identifier is empty".to_string(),
            });
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "llm.timeout_secs".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        if self.llm.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "llm.retry.max_attempts".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid {
                key: "llm.temperature".to_string(),
                reason: format!("{} is outside 0.0..=2.0", self.llm.temperature),
            });
        }
        Ok(())
    }
}
