//! Two-phase claim extraction pipeline: OCR, then LLM structuring.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{LlmError, OcrError, ParseError};
use crate::extraction::{ParsedClaim, PromptBuilder, ResultParser};
use crate::llm::LlmClient;
use crate::models::claim::ClaimRecord;
use crate::models::config::ExtractionConfig;
use crate::ocr::{OcrAdapter, OcrEngine, OcrText, RawImage};

/// Pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ocr,
    Llm,
    Parse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Ocr => "ocr",
            Stage::Llm => "llm",
            Stage::Parse => "parse",
        })
    }
}

/// The underlying failure of a stage.
#[derive(Error, Debug)]
pub enum StageErrorKind {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A stage failure tagged with its origin.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {kind}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub kind: StageErrorKind,
}

impl From<OcrError> for StageError {
    fn from(err: OcrError) -> Self {
        Self {
            stage: Stage::Ocr,
            kind: err.into(),
        }
    }
}

impl From<LlmError> for StageError {
    fn from(err: LlmError) -> Self {
        Self {
            stage: Stage::Llm,
            kind: err.into(),
        }
    }
}

impl From<ParseError> for StageError {
    fn from(err: ParseError) -> Self {
        Self {
            stage: Stage::Parse,
            kind: err.into(),
        }
    }
}

/// Outcome of one pipeline run.
///
/// `ocr_text` is kept whenever OCR succeeded, so the intermediate evidence
/// survives LLM and parse failures.
#[derive(Debug)]
pub struct PipelineResult {
    pub ocr_text: Option<OcrText>,
    pub outcome: Result<ParsedClaim, StageError>,
}

impl PipelineResult {
    /// The extracted record, if the run succeeded.
    pub fn record(&self) -> Option<&ClaimRecord> {
        self.outcome.as_ref().ok().map(|p| &p.record)
    }

    /// The stage that failed, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.outcome.as_ref().err().map(|e| e.stage)
    }
}

/// Sequences OCR, prompt building, the LLM call and result parsing.
pub struct Pipeline {
    ocr: OcrAdapter,
    prompts: PromptBuilder,
    llm: Arc<dyn LlmClient>,
    parser: ResultParser,
    skip_llm_on_empty: bool,
}

impl Pipeline {
    /// Create a pipeline around an already-initialized engine and client.
    pub fn new(engine: Arc<dyn OcrEngine>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            ocr: OcrAdapter::new(engine),
            prompts: PromptBuilder::new(),
            llm,
            parser: ResultParser::new(),
            skip_llm_on_empty: true,
        }
    }

    /// Apply extraction settings.
    pub fn with_extraction_config(mut self, config: &ExtractionConfig) -> Self {
        self.prompts = PromptBuilder::new().with_extra_instructions(config.extra_instructions.clone());
        self.parser = ResultParser::new().with_account_normalization(config.normalize_account_number);
        self.skip_llm_on_empty = config.skip_llm_on_empty;
        self
    }

    /// Phase one: recognize the image's text.
    pub fn recognize(&self, image: &RawImage) -> Result<OcrText, StageError> {
        Ok(self.ocr.extract(image)?)
    }

    /// Phase two: correct and structure recognized text.
    pub async fn structure(&self, ocr_text: &OcrText) -> Result<ParsedClaim, StageError> {
        if ocr_text.is_empty() && self.skip_llm_on_empty {
            warn!("OCR found no text; skipping LLM and returning an empty record");
            return Ok(ParsedClaim::new(ClaimRecord::default()));
        }

        let prompt = self.prompts.build(ocr_text);
        debug!("Built extraction prompt ({} chars)", prompt.as_str().chars().count());

        info!("Requesting structuring from {} ({})", self.llm.name(), self.llm.model());
        let reply = self.llm.complete(&prompt).await?;
        info!("LLM replied in {}ms", reply.latency_ms);
        debug!("Raw model output: {}", reply.text);

        let parsed = self.parser.parse(&reply.text)?;
        debug!("Extracted record: {:?}", parsed.record);

        Ok(parsed)
    }

    /// Run both phases.
    pub async fn run(&self, image: RawImage) -> PipelineResult {
        self.run_with(image, |_| {}).await
    }

    /// Run both phases, handing the OCR text to `on_ocr` before structuring starts.
    pub async fn run_with<F>(&self, image: RawImage, on_ocr: F) -> PipelineResult
    where
        F: FnOnce(&OcrText),
    {
        let start = Instant::now();

        let ocr_text = match self.recognize(&image) {
            Ok(text) => text,
            Err(e) => {
                warn!("{}", e);
                return PipelineResult {
                    ocr_text: None,
                    outcome: Err(e),
                };
            }
        };
        drop(image);

        on_ocr(&ocr_text);

        let outcome = self.structure(&ocr_text).await;
        match &outcome {
            Ok(parsed) => info!(
                "Pipeline complete in {}ms with {} field issue(s)",
                start.elapsed().as_millis(),
                parsed.issues.len()
            ),
            Err(e) => warn!("{}", e),
        }

        PipelineResult {
            ocr_text: Some(ocr_text),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::ScriptedClient;
    use crate::models::claim::{ClaimField, FieldIssue};
    use crate::ocr::test_support::{png_bytes, FixedEngine};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    const OCR_FRAGMENTS: [&str; 10] = [
        "청구인", "홍길동", "사고일", "2024-01-01", "진단명", "발목염좌", "은행", "신한", "계좌",
        "110123456789",
    ];

    const MODEL_REPLY: &str = r#"{"claimant_name":"홍길동","accident_date":"2024-01-01","diagnosis_name":"발목 염좌","bank_name":"신한은행","account_number":"110123456789"}"#;

    fn pipeline(engine: FixedEngine, llm: Arc<ScriptedClient>) -> Pipeline {
        Pipeline::new(Arc::new(engine), llm)
    }

    fn image() -> RawImage {
        RawImage::new(png_bytes())
    }

    #[tokio::test]
    async fn test_end_to_end_extracts_record() {
        let llm = Arc::new(ScriptedClient::replying(MODEL_REPLY));
        let pipeline = pipeline(FixedEngine(OCR_FRAGMENTS.to_vec()), llm.clone());

        let result = pipeline.run(image()).await;

        let ocr_text = result.ocr_text.as_ref().unwrap();
        assert_eq!(
            ocr_text.text(),
            "청구인 홍길동 사고일 2024-01-01 진단명 발목염좌 은행 신한 계좌 110123456789"
        );
        assert_eq!(
            result.record(),
            Some(&ClaimRecord::new(
                "홍길동",
                "2024-01-01",
                "발목 염좌",
                "신한은행",
                "110123456789"
            ))
        );
        assert!(llm.prompts.lock().unwrap()[0].contains(ocr_text.text()));
    }

    #[tokio::test]
    async fn test_refusal_is_parse_error_with_ocr_text_kept() {
        let llm = Arc::new(ScriptedClient::replying("Sorry, I cannot process this."));
        let pipeline = pipeline(FixedEngine(OCR_FRAGMENTS.to_vec()), llm);

        let result = pipeline.run(image()).await;

        assert_eq!(result.failed_stage(), Some(Stage::Parse));
        assert!(matches!(
            result.outcome,
            Err(StageError {
                kind: StageErrorKind::Parse(ParseError::Malformed(_)),
                ..
            })
        ));
        assert!(result.ocr_text.unwrap().text().starts_with("청구인 홍길동"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_tagged_llm() {
        let llm = Arc::new(ScriptedClient::new(vec![Err(LlmError::Authentication(
            "API key not valid".to_string(),
        ))]));
        let pipeline = pipeline(FixedEngine(vec!["청구인"]), llm);

        let result = pipeline.run(image()).await;

        assert_eq!(result.failed_stage(), Some(Stage::Llm));
        assert!(result.ocr_text.is_some());
        let err = result.outcome.unwrap_err();
        assert_eq!(err.to_string(), "llm stage failed: authentication failed: API key not valid");
    }

    #[tokio::test]
    async fn test_undecodable_image_is_tagged_ocr() {
        let llm = Arc::new(ScriptedClient::replying(MODEL_REPLY));
        let pipeline = pipeline(FixedEngine(vec!["unused"]), llm.clone());

        let result = pipeline.run(RawImage::new(b"GIF89a?".to_vec())).await;

        assert_eq!(result.failed_stage(), Some(Stage::Ocr));
        assert!(result.ocr_text.is_none());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_ocr_text_delivered_before_llm_call() {
        let llm = Arc::new(ScriptedClient::replying(MODEL_REPLY));
        let pipeline = pipeline(FixedEngine(vec!["청구인", "홍길동"]), llm.clone());
        let seen = RefCell::new(None);

        let result = pipeline
            .run_with(image(), |ocr| {
                *seen.borrow_mut() = Some((ocr.text().to_string(), llm.calls()));
            })
            .await;

        assert_eq!(seen.into_inner(), Some(("청구인 홍길동".to_string(), 0)));
        assert!(result.outcome.is_ok());
    }

    #[tokio::test]
    async fn test_empty_ocr_skips_llm() {
        let llm = Arc::new(ScriptedClient::replying(MODEL_REPLY));
        let pipeline = pipeline(FixedEngine(vec![]), llm.clone());

        let result = pipeline.run(image()).await;

        let parsed = result.outcome.unwrap();
        assert_eq!(parsed.record, ClaimRecord::default());
        assert!(parsed.issues.contains(&FieldIssue::Missing(ClaimField::ClaimantName)));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_ocr_can_still_call_llm() {
        let llm = Arc::new(ScriptedClient::replying(MODEL_REPLY));
        let config = ExtractionConfig {
            skip_llm_on_empty: false,
            ..ExtractionConfig::default()
        };
        let pipeline =
            pipeline(FixedEngine(vec![]), llm.clone()).with_extraction_config(&config);

        let result = pipeline.run(image()).await;

        assert!(result.outcome.is_ok());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_phases_can_be_driven_separately() {
        let llm = Arc::new(ScriptedClient::replying(MODEL_REPLY));
        let pipeline = pipeline(FixedEngine(OCR_FRAGMENTS.to_vec()), llm);

        let ocr_text = pipeline.recognize(&image()).unwrap();
        let parsed = pipeline.structure(&ocr_text).await.unwrap();

        assert_eq!(parsed.record.bank_name(), "신한은행");
    }
}
