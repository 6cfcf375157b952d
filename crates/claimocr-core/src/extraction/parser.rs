//! Turns raw model output into a validated claim record.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::claim::{ClaimField, ClaimRecord, FieldIssue};

use super::patterns::{FENCE_CLOSE, FENCE_OPEN, NON_DIGIT};

/// A parsed record plus advisory findings about its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedClaim {
    /// The extracted record.
    pub record: ClaimRecord,
    /// Non-fatal issues (missing fields, non-ISO date, separators in account).
    pub issues: Vec<FieldIssue>,
}

impl ParsedClaim {
    /// Wrap a record, computing its issues.
    pub fn new(record: ClaimRecord) -> Self {
        let issues = record.validate();
        Self { record, issues }
    }
}

/// Parser for LLM output.
#[derive(Debug, Clone, Default)]
pub struct ResultParser {
    normalize_account_number: bool,
}

impl ResultParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip separators from the account number after flagging them.
    pub fn with_account_normalization(mut self, normalize: bool) -> Self {
        self.normalize_account_number = normalize;
        self
    }

    /// Parse model output: de-fence, decode JSON, validate against the schema.
    pub fn parse(&self, raw: &str) -> Result<ParsedClaim, ParseError> {
        let cleaned = strip_code_fences(raw);
        if cleaned.len() != raw.trim().len() {
            debug!("Stripped code fences from model output");
        }

        let value: Value = serde_json::from_str(cleaned)
            .map_err(|e| ParseError::Malformed(format!("{} in {:?}", e, preview(cleaned))))?;

        let object = match value {
            Value::Object(map) => map,
            other => {
                return Err(ParseError::Malformed(format!(
                    "expected a JSON object, got {}",
                    json_type(&other)
                )));
            }
        };

        let record = record_from_object(object)?;
        let mut parsed = ParsedClaim::new(record);

        if self.normalize_account_number
            && parsed
                .issues
                .iter()
                .any(|i| matches!(i, FieldIssue::NonDigitAccount(_)))
        {
            let digits = NON_DIGIT
                .replace_all(parsed.record.account_number(), "")
                .into_owned();
            parsed.record.set(ClaimField::AccountNumber, digits);
        }

        for issue in &parsed.issues {
            warn!("Extracted claim: {}", issue);
        }

        Ok(parsed)
    }
}

/// Remove one leading and one trailing Markdown code fence, plus surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(m) = FENCE_OPEN.find(text) {
        text = &text[m.end()..];
    }
    if let Some(m) = FENCE_CLOSE.find(text) {
        text = &text[..m.start()];
    }
    text.trim()
}

fn record_from_object(object: Map<String, Value>) -> Result<ClaimRecord, ParseError> {
    let mut record = ClaimRecord::default();

    for (key, value) in object {
        let field: ClaimField = key.parse().map_err(|_| ParseError::SchemaViolation {
            field: key.clone(),
            reason: "not a recognized claim field".to_string(),
        })?;

        let text = match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(ParseError::SchemaViolation {
                    field: key,
                    reason: format!("expected a scalar, got {}", json_type(&other)),
                });
            }
        };

        record.set(field, text);
    }

    Ok(record)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CLEAN: &str = r#"{"claimant_name":"홍길동","accident_date":"2024-01-01","diagnosis_name":"발목 염좌","bank_name":"신한은행","account_number":"110123456789"}"#;

    fn expected() -> ClaimRecord {
        ClaimRecord::new("홍길동", "2024-01-01", "발목 염좌", "신한은행", "110123456789")
    }

    fn parse(raw: &str) -> Result<ParsedClaim, ParseError> {
        ResultParser::new().parse(raw)
    }

    #[test]
    fn test_clean_json() {
        let parsed = parse(CLEAN).unwrap();
        assert_eq!(parsed.record, expected());
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_pretty_printed_json_is_unchanged() {
        let pretty = expected().to_json_pretty().unwrap();
        assert_eq!(parse(&pretty).unwrap().record, expected());
    }

    #[test]
    fn test_round_trip() {
        let record = ClaimRecord::new("Kim \"Jay\" Lee", "", "독감", "", "0012");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(parse(&json).unwrap().record, record);
    }

    #[test]
    fn test_fencing_variants_parse_identically() {
        let variants = [
            format!("```json\n{}\n```", CLEAN),
            format!("```\n{}\n```", CLEAN),
            format!("  \n```JSON\n{}\n```  \n", CLEAN),
            format!("```json{}```", CLEAN),
            CLEAN.to_string(),
        ];

        for raw in &variants {
            assert_eq!(parse(raw).unwrap().record, expected(), "input: {}", raw);
        }
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(parse("not json at all"), Err(ParseError::Malformed(_))));
        assert!(matches!(
            parse("Sorry, I cannot process this."),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(parse(""), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_trailing_text_and_multiple_objects_are_malformed() {
        assert!(matches!(
            parse(&format!("{} Hope this helps!", CLEAN)),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse(&format!("{}\n{}", CLEAN, CLEAN)),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse(r#"{"claimant_name": "홍길"#),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_top_level_is_malformed() {
        let err = parse(&format!("[{}]", CLEAN)).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(ref m) if m.contains("array")));
        assert!(matches!(parse("\"홍길동\""), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let parsed = parse(r#"{"claimant_name":"홍길동","bank_name":null}"#).unwrap();

        assert_eq!(parsed.record, ClaimRecord::new("홍길동", "", "", "", ""));
        assert!(parsed
            .issues
            .contains(&FieldIssue::Missing(ClaimField::AccidentDate)));
        assert!(parsed.issues.contains(&FieldIssue::Missing(ClaimField::BankName)));
    }

    #[test]
    fn test_nested_value_is_schema_violation() {
        let err = parse(r#"{"claimant_name":{"first":"길동","last":"홍"}}"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::SchemaViolation {
                field: "claimant_name".to_string(),
                reason: "expected a scalar, got object".to_string(),
            }
        );

        assert!(matches!(
            parse(r#"{"account_number":["110","123"]}"#),
            Err(ParseError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_unknown_key_is_schema_violation() {
        let err = parse(r#"{"claimant_name":"홍길동","policy_number":"P-1"}"#).unwrap_err();
        assert!(matches!(
            err,
            ParseError::SchemaViolation { ref field, .. } if field == "policy_number"
        ));
    }

    #[test]
    fn test_numeric_account_number_becomes_text() {
        let parsed = parse(r#"{"account_number":110123456789}"#).unwrap();
        assert_eq!(parsed.record.account_number(), "110123456789");
    }

    #[test]
    fn test_non_iso_date_is_flagged_not_rejected() {
        let parsed = parse(r#"{"accident_date":"2024년 1월 1일"}"#).unwrap();
        assert_eq!(parsed.record.accident_date(), "2024년 1월 1일");
        assert!(parsed
            .issues
            .contains(&FieldIssue::NonIsoDate("2024년 1월 1일".to_string())));
    }

    #[test]
    fn test_account_normalization() {
        let raw = r#"{"account_number":"110-123-456789"}"#;

        let kept = parse(raw).unwrap();
        assert_eq!(kept.record.account_number(), "110-123-456789");

        let normalized = ResultParser::new()
            .with_account_normalization(true)
            .parse(raw)
            .unwrap();
        assert_eq!(normalized.record.account_number(), "110123456789");
        assert!(normalized
            .issues
            .contains(&FieldIssue::NonDigitAccount("110-123-456789".to_string())));
    }

    #[test]
    fn test_strip_code_fences_leaves_inner_backticks() {
        assert_eq!(strip_code_fences("```json\n{\"a\":\"`x`\"}\n```"), "{\"a\":\"`x`\"}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }
}
