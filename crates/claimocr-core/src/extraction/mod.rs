//! Prompt construction and model-output parsing for claim extraction.

mod parser;
pub mod patterns;
mod prompt;

pub use parser::{strip_code_fences, ParsedClaim, ResultParser};
pub use prompt::{ExtractionPrompt, PromptBuilder, SCHEMA_VERSION};
