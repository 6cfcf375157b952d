//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::{ClaimConfig, OcrConfig};

use super::OcrEngine;

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// With the PP-OCR Korean recognition model the dictionary covers Hangul,
/// Latin letters and digits, so one model serves Korean and English forms.
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
    config: OcrConfig,
}

impl PureOcrEngine {
    /// Create an engine from the model files named in the configuration.
    pub fn from_config(config: &ClaimConfig) -> Result<Self, OcrError> {
        config
            .ocr
            .validate()
            .map_err(|e| OcrError::ModelLoad(e.to_string()))?;

        let det_path = config.model_path(&config.models.detection_model);
        let rec_path = config.model_path(&config.models.recognition_model);
        let dict_path = config.model_path(&config.models.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = Self::load(&det_path, &rec_path, &dict_path)?;

        info!(
            "Loaded pure-onnx-ocr engine from {} (languages: {})",
            config.models.model_dir.display(),
            config.ocr.languages.join(", ")
        );

        Ok(Self {
            engine,
            config: config.ocr.clone(),
        })
    }

    fn load(
        det_path: &Path,
        rec_path: &Path,
        dict_path: &Path,
    ) -> Result<pure_onnx_ocr::engine::OcrEngine, OcrError> {
        pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(det_path)
            .rec_model_path(rec_path)
            .dictionary_path(dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))
    }

    fn downscale(&self, image: &DynamicImage) -> Option<DynamicImage> {
        let max = self.config.max_image_size;
        let (width, height) = image.dimensions();
        if max == 0 || width.max(height) <= max {
            return None;
        }
        debug!("Downscaling {}x{} image to fit {}px", width, height, max);
        Some(image.resize(max, max, image::imageops::FilterType::Lanczos3))
    }
}

/// A recognized region before its geometry is dropped.
struct Region {
    text: String,
    left: f32,
    top: f32,
}

impl OcrEngine for PureOcrEngine {
    fn name(&self) -> &str {
        "pure-onnx-ocr"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>, OcrError> {
        let scaled = self.downscale(image);
        let input = scaled.as_ref().unwrap_or(image);

        let results = self
            .engine
            .run_from_image(input)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut regions: Vec<Region> = results
            .iter()
            .map(|r| {
                let (left, top) = top_left(&r.bounding_box);
                let text = if self.config.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Region { text, left, top }
            })
            .collect();

        if self.config.reading_order {
            sort_by_reading_order(&mut regions);
        }

        Ok(regions.into_iter().map(|r| r.text).collect())
    }
}

/// Sort regions top-to-bottom in 20px rows, then left-to-right within a row.
fn sort_by_reading_order(regions: &mut [Region]) {
    regions.sort_by(|a, b| {
        let row_a = (a.top / 20.0) as i32;
        let row_b = (b.top / 20.0) as i32;
        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            a.left
                .partial_cmp(&b.left)
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

/// Smallest x and y of a region polygon.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}
