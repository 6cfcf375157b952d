//! Process command - extract claim data from a single form photo.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use claimocr_core::{ClaimRecord, OcrText, RawImage};

use super::output::{format_record, OutputFormat, DEFAULT_EXPORT_NAME};
use super::{build_pipeline, is_supported_image, load_config, resolve_model_dir};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input image (PNG, JPEG, ...)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write JSON to ./insurance_claim_data.json
    #[arg(long, conflicts_with = "output")]
    export: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Print the recognized OCR text before structuring
    #[arg(long)]
    show_ocr: bool,

    /// Skip validation warnings
    #[arg(long)]
    quiet: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    resolve_model_dir(&mut config, args.model_dir.as_deref());

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_supported_image(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    let pipeline = build_pipeline(&config)?;

    info!("Processing file: {}", args.input.display());

    let image = RawImage::from_path(&args.input)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Running OCR...");

    let result = pipeline
        .run_with(image, |ocr| {
            if args.show_ocr {
                // stdout carries the record
                pb.suspend(|| {
                    let _ = write_ocr_text(&mut std::io::stderr(), ocr);
                });
            }
            pb.set_message(format!(
                "Structuring {} OCR fragments...",
                ocr.fragments().len()
            ));
        })
        .await;

    let parsed = match result.outcome {
        Ok(parsed) => {
            pb.finish_and_clear();
            parsed
        }
        Err(e) => {
            pb.abandon_with_message(format!("Failed at {} stage", e.stage));
            // OCR text survives later-stage failures
            if let Some(ocr) = result.ocr_text.as_ref().filter(|_| !args.show_ocr) {
                eprintln!();
                eprintln!("{}", style("OCR text:").yellow());
                eprintln!("{}", ocr.text());
            }
            anyhow::bail!("{}", e);
        }
    };

    if !args.quiet && !parsed.issues.is_empty() {
        eprintln!("{}", style("Validation issues:").yellow());
        for issue in &parsed.issues {
            eprintln!("  - {}", issue);
        }
    }

    write_output(&parsed.record, &args)?;

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn write_ocr_text(out: &mut impl Write, ocr: &OcrText) -> std::io::Result<()> {
    writeln!(
        out,
        "{} OCR text ({} fragments, {}ms):",
        style("ℹ").blue(),
        ocr.fragments().len(),
        ocr.processing_time_ms()
    )?;
    writeln!(out, "{}", ocr.text())?;
    writeln!(out)
}

fn write_output(record: &ClaimRecord, args: &ProcessArgs) -> anyhow::Result<()> {
    let output_path = if args.export {
        Some(PathBuf::from(DEFAULT_EXPORT_NAME))
    } else {
        args.output.clone()
    };
    let format = if args.export { OutputFormat::Json } else { args.format };

    let output = format_record(record, format)?;

    if let Some(output_path) = output_path {
        fs::write(&output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_text_goes_to_given_stream() {
        let ocr = OcrText::from_fragments(vec!["청구인".to_string(), "홍길동".to_string()]);
        let mut out = Vec::new();

        write_ocr_text(&mut out, &ocr).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("OCR text (2 fragments"));
        assert!(text.contains("청구인 홍길동\n"));
    }
}
