//! Record rendering shared by `process` and `batch`.

use claimocr_core::{ClaimField, ClaimRecord};

/// Default file name for JSON exports.
pub const DEFAULT_EXPORT_NAME: &str = "insurance_claim_data.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON with the five claim keys
    Json,
    /// CSV with a header row
    Csv,
    /// Plain text table
    Text,
}

impl OutputFormat {
    /// File extension for files written in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_record(record: &ClaimRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(record.to_json_pretty()?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &ClaimRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(ClaimField::ALL.iter().map(|f| f.key()))?;
    wtr.write_record(record.fields().map(|(_, value)| value))?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &ClaimRecord) -> String {
    let width = ClaimField::ALL
        .iter()
        .map(|f| f.label().len())
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    for (field, value) in record.fields() {
        let value = if value.is_empty() { "-" } else { value };
        output.push_str(&format!("{:<width$}  {}\n", field.label(), value, width = width));
    }
    output
}
