//! Models command - inspect the OCR model files.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use super::{default_model_dir, load_config, resolve_model_dir};

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Show which model files are present
    Status {
        /// Model directory to check
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },

    /// Show the per-user model directory
    Path,
}

pub fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Status { model_dir } => show_status(config_path, model_dir.as_deref()),
        ModelsCommand::Path => {
            println!("{}", default_model_dir().display());
            Ok(())
        }
    }
}

fn show_status(config_path: Option<&str>, model_dir: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    resolve_model_dir(&mut config, model_dir);

    println!("Model directory: {}", config.models.model_dir.display());
    println!("Languages: {}", config.ocr.languages.join(", "));
    println!();

    let files = [
        ("detection", &config.models.detection_model),
        ("recognition", &config.models.recognition_model),
        ("dictionary", &config.models.dictionary),
    ];

    let mut missing = 0;
    for (role, name) in files {
        let path = config.model_path(name);
        if path.exists() {
            println!("  {} {:<12} {}", style("✓").green(), role, name);
        } else {
            missing += 1;
            println!("  {} {:<12} {}", style("✗").red(), role, name);
        }
    }

    println!();
    if missing == 0 {
        println!("Status: {}", style("ready").green());
    } else {
        println!("Status: {}", style(format!("{} file(s) missing", missing)).yellow());
        println!();
        println!(
            "Place PP-OCR ONNX detection and Korean recognition models in {}",
            config.models.model_dir.display()
        );
        println!("or point 'models.model_dir' in the config at them.");
    }

    Ok(())
}
