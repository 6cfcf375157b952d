//! Builds the correction/extraction instruction sent to the LLM.

use std::fmt;

use crate::models::claim::ClaimField;
use crate::ocr::OcrText;

/// Version of the five-field claim schema the prompt describes.
pub const SCHEMA_VERSION: u32 = 1;

/// The full instruction payload for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt(String);

impl ExtractionPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExtractionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic prompt builder.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    extra_instructions: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append mission lines after the two built-in steps.
    pub fn with_extra_instructions(mut self, lines: Vec<String>) -> Self {
        self.extra_instructions = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        self
    }

    /// Build the prompt. The OCR text is embedded verbatim and in full.
    pub fn build(&self, ocr_text: &OcrText) -> ExtractionPrompt {
        let mut prompt = String::with_capacity(1024 + ocr_text.text().len());

        prompt.push_str("당신은 베테랑 보험 심사역입니다.\n");
        prompt.push_str(
            "You are a veteran insurance claims reviewer acting as a domain-expert reviewer.\n",
        );
        prompt.push_str(
            "아래 텍스트는 '보험금 청구서'를 OCR로 읽어낸 결과(Raw Data)입니다. \
             인식 오류나 오타가 많이 포함되어 있을 수 있습니다.\n\n",
        );

        prompt.push_str("[수행 미션]\n");
        prompt.push_str("1. 문맥을 파악하여 OCR 오타를 교정하세요. (Correct OCR noise using context.)\n");
        prompt.push_str(
            "2. 아래 항목만 찾아 하나의 JSON 객체로만 출력하세요. Markdown 코드 블럭이나 \
             설명 없이 순수 JSON만 출력하세요. (Output only these fields as a single JSON \
             object, with no code fences and no commentary.)\n",
        );
        for (i, line) in self.extra_instructions.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 3, line));
        }
        prompt.push('\n');

        prompt.push_str(&format!("[추출 항목] (schema v{})\n", SCHEMA_VERSION));
        for field in ClaimField::ALL {
            prompt.push_str(&format!("- {}: {}\n", field.key(), field.description()));
        }
        prompt.push_str(
            "값을 찾을 수 없는 항목은 빈 문자열(\"\")로 두세요. \
             (Use an empty string for any field you cannot find.)\n\n",
        );

        prompt.push_str("[OCR Raw Text]\n");
        prompt.push_str(ocr_text.text());
        prompt.push('\n');

        ExtractionPrompt(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ocr(text: &str) -> OcrText {
        OcrText::from_fragments(text.split(' ').map(String::from).collect())
    }

    #[test]
    fn test_embeds_full_text_verbatim() {
        let long = "청구인 홍길동 ".repeat(2_000);
        let text = ocr(long.trim_end());

        let prompt = builder_output(&text);

        assert!(prompt.contains(text.text()));
    }

    #[test]
    fn test_lists_every_field() {
        let prompt = builder_output(&ocr("x"));
        for field in ClaimField::ALL {
            assert!(prompt.contains(field.key()), "missing {}", field.key());
        }
        assert!(prompt.contains("보험 심사역"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn test_deterministic() {
        let text = ocr("청구인 홍길동 사고일 2024-01-01");
        let builder = PromptBuilder::new();
        assert_eq!(builder.build(&text), builder.build(&text));
    }

    #[test]
    fn test_empty_text_still_builds() {
        let prompt = builder_output(&OcrText::empty());
        assert!(prompt.ends_with("[OCR Raw Text]\n\n"));
    }

    #[test]
    fn test_extra_instructions_are_numbered_after_builtin_steps() {
        let prompt = PromptBuilder::new()
            .with_extra_instructions(vec![
                "은행명은 정식 명칭으로 쓰세요.".to_string(),
                "  ".to_string(),
            ])
            .build(&ocr("x"));

        assert!(prompt.as_str().contains("3. 은행명은 정식 명칭으로 쓰세요.\n"));
        assert!(!prompt.as_str().contains("4. "));
    }

    fn builder_output(text: &OcrText) -> String {
        PromptBuilder::new().build(text).into_string()
    }
}
