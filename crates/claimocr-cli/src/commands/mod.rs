//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod models;
pub mod output;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use claimocr_core::models::config::ClaimConfig;
use claimocr_core::{LlmClient, Pipeline, PureOcrEngine};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("claimocr")
        .join("config.json")
}

/// Per-user model directory used when the configured one does not exist.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("claimocr")
        .join("models")
}

/// Load the configuration: explicit path, then the default file, then defaults.
///
/// Environment overrides are applied to the LLM section afterwards.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ClaimConfig> {
    let mut config = match config_path {
        Some(path) => ClaimConfig::from_file(Path::new(path))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                ClaimConfig::from_file(&default_path)?
            } else {
                ClaimConfig::default()
            }
        }
    };

    config.llm = config.llm.with_env_overrides();
    config.validate()?;

    Ok(config)
}

/// Point the config at the model directory to use.
pub fn resolve_model_dir(config: &mut ClaimConfig, model_dir: Option<&Path>) {
    config.models.model_dir = match model_dir {
        Some(dir) => dir.to_path_buf(),
        None if config.models.model_dir.exists() => config.models.model_dir.clone(),
        None => default_model_dir(),
    };
    debug!("Model directory: {}", config.models.model_dir.display());
}

/// Build the LLM client and OCR engine once and wrap them in a pipeline.
///
/// The client is built first so a missing API key fails before models load.
pub fn build_pipeline(config: &ClaimConfig) -> anyhow::Result<Pipeline> {
    let llm: Arc<dyn LlmClient> = claimocr_core::build_client(&config.llm)?;

    let engine = PureOcrEngine::from_config(config).map_err(|e| {
        anyhow::anyhow!(
            "{}\n\nRun 'claimocr models status' to see which model files are expected.",
            e
        )
    })?;

    Ok(Pipeline::new(Arc::new(engine), llm).with_extraction_config(&config.extraction))
}

/// True for file extensions the image decoder understands.
pub fn is_supported_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "tiff" | "tif" | "bmp" | "gif"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_images() {
        assert!(is_supported_image(Path::new("claim.PNG")));
        assert!(is_supported_image(Path::new("scan/claim.jpeg")));
        assert!(!is_supported_image(Path::new("claim.pdf")));
        assert!(!is_supported_image(Path::new("claim")));
    }

    #[test]
    fn test_explicit_model_dir_wins() {
        let mut config = ClaimConfig::default();
        resolve_model_dir(&mut config, Some(Path::new("/opt/ocr")));
        assert_eq!(config.models.model_dir, PathBuf::from("/opt/ocr"));
    }

    #[test]
    fn test_missing_model_dir_falls_back() {
        let mut config = ClaimConfig::default();
        config.models.model_dir = PathBuf::from("/nonexistent/claimocr/models");
        resolve_model_dir(&mut config, None);
        assert_eq!(config.models.model_dir, default_model_dir());
    }
}
