//! OCR stage: raw image bytes to ordered text fragments.

#[cfg(feature = "native")]
mod pure_engine;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::OcrError;

/// An uploaded photograph, as undecoded bytes.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    source: Option<String>,
}

impl RawImage {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            source: None,
        }
    }

    /// Read an image file from disk, labelled with its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self { bytes, source })
    }

    /// Attach a label used in log output.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Recognized text of one image.
///
/// The concatenation is always the fragments joined by a single space, in
/// the order the engine returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrText {
    fragments: Vec<String>,
    text: String,
    processing_time_ms: u64,
    image_size: (u32, u32),
}

impl OcrText {
    /// Build from fragments in engine order.
    pub fn from_fragments(fragments: Vec<String>) -> Self {
        let text = fragments.join(" ");
        Self {
            fragments,
            text,
            processing_time_ms: 0,
            image_size: (0, 0),
        }
    }

    /// An OCR result with no fragments.
    pub fn empty() -> Self {
        Self::from_fragments(Vec::new())
    }

    fn with_metadata(mut self, processing_time_ms: u64, image_size: (u32, u32)) -> Self {
        self.processing_time_ms = processing_time_ms;
        self.image_size = image_size;
        self
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Space-joined fragments.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn processing_time_ms(&self) -> u64 {
        self.processing_time_ms
    }

    /// Decoded image dimensions (width, height).
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// True when nothing but whitespace was recognized.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A text detection + recognition engine.
///
/// Implementations run over the whole image and return fragment texts in
/// their natural reading order. They must not keep per-call state, so one
/// instance can serve any number of sequential requests.
pub trait OcrEngine {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Recognize all text in the image.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>, OcrError>;
}

/// Decodes uploaded bytes and runs the injected engine over them.
#[derive(Clone)]
pub struct OcrAdapter {
    engine: Arc<dyn OcrEngine>,
}

impl OcrAdapter {
    /// Create an adapter around a shared engine.
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Name of the underlying engine.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Decode the image and extract its text.
    ///
    /// An image without any text yields an empty `OcrText`, not an error.
    pub fn extract(&self, image: &RawImage) -> Result<OcrText, OcrError> {
        let start = Instant::now();
        let decoded = decode(image)?;
        let (width, height) = decoded.dimensions();

        info!(
            "Running {} OCR on {} ({}x{})",
            self.engine.name(),
            image.source().unwrap_or("<upload>"),
            width,
            height
        );

        let fragments = self.engine.recognize(&decoded)?;
        let result = OcrText::from_fragments(fragments)
            .with_metadata(start.elapsed().as_millis() as u64, (width, height));

        if result.fragments().is_empty() {
            debug!("No text regions recognized");
        }

        info!(
            "OCR complete: {} fragments, {} chars in {}ms",
            result.fragments().len(),
            result.text().chars().count(),
            result.processing_time_ms()
        );

        Ok(result)
    }
}

/// Decode raster bytes into a pixel grid.
pub fn decode(image: &RawImage) -> Result<DynamicImage, OcrError> {
    if image.is_empty() {
        return Err(OcrError::Decode("empty image buffer".to_string()));
    }

    let decoded =
        image::load_from_memory(image.as_bytes()).map_err(|e| OcrError::Decode(e.to_string()))?;

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::Decode(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }

    debug!("Decoded {} bytes into {}x{} image", image.len(), width, height);
    Ok(decoded)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_concatenation_is_space_join() {
        let text = OcrText::from_fragments(vec![
            "청구인".to_string(),
            "홍길동".to_string(),
            "".to_string(),
            "사고일".to_string(),
        ]);
        assert_eq!(text.text(), "청구인 홍길동  사고일");
        assert_eq!(text.fragments().len(), 4);
    }

    #[test]
    fn test_extract_keeps_engine_order() {
        let adapter = OcrAdapter::new(Arc::new(FixedEngine(vec!["계좌", "110123456789", "은행"])));
        let image = RawImage::new(png_bytes());

        let result = adapter.extract(&image).unwrap();

        assert_eq!(result.fragments(), &["계좌", "110123456789", "은행"]);
        assert_eq!(result.text(), "계좌 110123456789 은행");
        assert_eq!(result.image_size(), (16, 8));
    }

    #[test]
    fn test_no_fragments_is_valid_empty_text() {
        let adapter = OcrAdapter::new(Arc::new(FixedEngine(vec![])));
        let result = adapter.extract(&RawImage::new(png_bytes())).unwrap();

        assert!(result.is_empty());
        assert_eq!(result.text(), "");
    }

    #[test]
    fn test_undecodable_bytes_fail_with_decode_error() {
        let adapter = OcrAdapter::new(Arc::new(FixedEngine(vec!["unused"])));

        let err = adapter
            .extract(&RawImage::new(b"definitely not a png".to_vec()))
            .unwrap_err();
        assert!(matches!(err, OcrError::Decode(_)));

        let err = adapter.extract(&RawImage::new(Vec::new())).unwrap_err();
        assert!(matches!(err, OcrError::Decode(_)));
    }

    #[test]
    fn test_input_buffer_untouched() {
        let bytes = png_bytes();
        let image = RawImage::new(bytes.clone()).with_source("claim.png");
        let adapter = OcrAdapter::new(Arc::new(FixedEngine(vec!["a"])));

        adapter.extract(&image).unwrap();

        assert_eq!(image.as_bytes(), bytes.as_slice());
        assert_eq!(image.source(), Some("claim.png"));
    }
}
