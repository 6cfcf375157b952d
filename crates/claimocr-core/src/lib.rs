//! Core library for insurance claim form extraction.
//!
//! This crate provides:
//! - OCR of claim-form photographs (Korean and English) via `pure-onnx-ocr`
//! - Prompt construction for LLM-based OCR correction and field extraction
//! - Gemini and OpenAI-compatible LLM clients with an opt-in retry policy
//! - Parsing and validation of model output into a five-field claim record
//! - A two-phase pipeline that keeps the OCR text when later stages fail

pub mod error;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;

pub use error::{ClaimError, ConfigError, LlmError, OcrError, ParseError, Result};
pub use extraction::{ExtractionPrompt, ParsedClaim, PromptBuilder, ResultParser};
pub use llm::{build_client, LlmClient, RawModelText};
pub use models::claim::{ClaimField, ClaimRecord, FieldIssue};
pub use models::config::ClaimConfig;
pub use ocr::{OcrAdapter, OcrEngine, OcrText, RawImage};
pub use pipeline::{Pipeline, PipelineResult, Stage, StageError};

#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
