//! Insurance claim record extracted from a claim form.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::extraction::patterns::{ISO_DATE, NON_DIGIT};

/// The five fields of the claim schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimField {
    /// Claimant / insured person's name (청구인/피보험자 성명).
    ClaimantName,
    /// Accident or onset date, YYYY-MM-DD (사고일자/발병일).
    AccidentDate,
    /// Diagnosis or reason for the claim (진단명 또는 청구사유).
    DiagnosisName,
    /// Bank receiving the payout (지급받을 계좌 은행명).
    BankName,
    /// Payout account number, digits only (지급받을 계좌번호).
    AccountNumber,
}

impl ClaimField {
    /// All fields in schema order.
    pub const ALL: [ClaimField; 5] = [
        ClaimField::ClaimantName,
        ClaimField::AccidentDate,
        ClaimField::DiagnosisName,
        ClaimField::BankName,
        ClaimField::AccountNumber,
    ];

    /// JSON key of the field.
    pub fn key(&self) -> &'static str {
        match self {
            ClaimField::ClaimantName => "claimant_name",
            ClaimField::AccidentDate => "accident_date",
            ClaimField::DiagnosisName => "diagnosis_name",
            ClaimField::BankName => "bank_name",
            ClaimField::AccountNumber => "account_number",
        }
    }

    /// Semantic description embedded in the extraction prompt.
    pub fn description(&self) -> &'static str {
        match self {
            ClaimField::ClaimantName => "청구인/피보험자 성명 (claimant or insured person's name)",
            ClaimField::AccidentDate => "사고일자/발병일, YYYY-MM-DD 형식 (accident or onset date)",
            ClaimField::DiagnosisName => {
                "진단명 또는 청구사유. 예: '발목 염좌', '독감' 등 (diagnosis or reason for the claim)"
            }
            ClaimField::BankName => "지급받을 계좌 은행명 (bank of the payout account)",
            ClaimField::AccountNumber => "지급받을 계좌번호, 숫자만 (payout account number, digits only)",
        }
    }

    /// Human-readable label for text output.
    pub fn label(&self) -> &'static str {
        match self {
            ClaimField::ClaimantName => "Claimant",
            ClaimField::AccidentDate => "Accident date",
            ClaimField::DiagnosisName => "Diagnosis",
            ClaimField::BankName => "Bank",
            ClaimField::AccountNumber => "Account number",
        }
    }
}

impl fmt::Display for ClaimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ClaimField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimField::ALL
            .iter()
            .copied()
            .find(|field| field.key() == s)
            .ok_or_else(|| format!("unknown claim field: {}", s))
    }
}

/// Structured claim data.
///
/// Always carries all five keys; a value the model did not provide is the
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimRecord {
    claimant_name: String,
    accident_date: String,
    diagnosis_name: String,
    bank_name: String,
    account_number: String,
}

impl ClaimRecord {
    /// Create a record from the five field values, in schema order.
    pub fn new(
        claimant_name: impl Into<String>,
        accident_date: impl Into<String>,
        diagnosis_name: impl Into<String>,
        bank_name: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            claimant_name: claimant_name.into(),
            accident_date: accident_date.into(),
            diagnosis_name: diagnosis_name.into(),
            bank_name: bank_name.into(),
            account_number: account_number.into(),
        }
    }

    pub fn claimant_name(&self) -> &str {
        &self.claimant_name
    }

    pub fn accident_date(&self) -> &str {
        &self.accident_date
    }

    pub fn diagnosis_name(&self) -> &str {
        &self.diagnosis_name
    }

    pub fn bank_name(&self) -> &str {
        &self.bank_name
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    /// Get a field value by schema field.
    pub fn get(&self, field: ClaimField) -> &str {
        match field {
            ClaimField::ClaimantName => &self.claimant_name,
            ClaimField::AccidentDate => &self.accident_date,
            ClaimField::DiagnosisName => &self.diagnosis_name,
            ClaimField::BankName => &self.bank_name,
            ClaimField::AccountNumber => &self.account_number,
        }
    }

    pub(crate) fn set(&mut self, field: ClaimField, value: String) {
        let slot = match field {
            ClaimField::ClaimantName => &mut self.claimant_name,
            ClaimField::AccidentDate => &mut self.accident_date,
            ClaimField::DiagnosisName => &mut self.diagnosis_name,
            ClaimField::BankName => &mut self.bank_name,
            ClaimField::AccountNumber => &mut self.account_number,
        };
        *slot = value;
    }

    /// Iterate over `(field, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (ClaimField, &str)> {
        ClaimField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    /// The accident date as a calendar date, if it is a valid YYYY-MM-DD.
    pub fn accident_date_parsed(&self) -> Option<NaiveDate> {
        if !ISO_DATE.is_match(&self.accident_date) {
            return None;
        }
        NaiveDate::parse_from_str(&self.accident_date, "%Y-%m-%d").ok()
    }

    /// Check field contents. Issues are advisory; the record stays usable.
    pub fn validate(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        for (field, value) in self.fields() {
            if value.trim().is_empty() {
                issues.push(FieldIssue::Missing(field));
            }
        }

        if !self.accident_date.is_empty() && self.accident_date_parsed().is_none() {
            issues.push(FieldIssue::NonIsoDate(self.accident_date.clone()));
        }

        if !self.account_number.is_empty() && NON_DIGIT.is_match(&self.account_number) {
            issues.push(FieldIssue::NonDigitAccount(self.account_number.clone()));
        }

        issues
    }

    /// Pretty-printed UTF-8 JSON with exactly the five keys.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A non-fatal finding about an extracted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldIssue {
    /// The field is empty.
    Missing(ClaimField),
    /// The accident date is not a valid YYYY-MM-DD calendar date.
    NonIsoDate(String),
    /// The account number contains characters other than digits.
    NonDigitAccount(String),
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Missing(field) => write!(f, "missing {}", field),
            FieldIssue::NonIsoDate(value) => {
                write!(f, "accident_date '{}' is not a YYYY-MM-DD date", value)
            }
            FieldIssue::NonDigitAccount(value) => {
                write!(f, "account_number '{}' contains non-digit characters", value)
            }
        }
    }
}
