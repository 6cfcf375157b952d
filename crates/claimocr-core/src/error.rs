//! Error types for the claimocr-core library.

use thiserror::Error;

/// Main error type for the claimocr library.
#[derive(Error, Debug)]
pub enum ClaimError {
    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// LLM service error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Model output could not be turned into a claim record.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The input bytes are not a decodable raster image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text detection or recognition failed inside the engine.
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

/// Errors at the LLM service boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The credential was rejected or missing.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Transient failure: 5xx, connection error or timeout.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limit or quota exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-success HTTP status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service answered but the payload held no usable text.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

/// Errors raised while parsing model output into a claim record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The output is not a single JSON object.
    #[error("malformed model output: {0}")]
    Malformed(String),

    /// The JSON object does not fit the claim schema.
    #[error("schema violation for {field}: {reason}")]
    SchemaViolation { field: String, reason: String },
}

/// Errors related to configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read or write the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for the config schema.
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// No API key for the configured LLM provider.
    #[error("no API key configured; set {0} or llm.api_key")]
    MissingApiKey(&'static str),

    /// A value is out of range or inconsistent.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Result type for the claimocr library.
pub type Result<T> = std::result::Result<T, ClaimError>;
