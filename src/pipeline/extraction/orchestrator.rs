use std::path::Path;

use super::confidence::classify_text;
use super::ocr::recognize_text;
use super::preprocess::normalize_to_png;
use super::types::{ConfidenceTier, ExtractionResult, OcrEngine};
use super::ExtractionError;
use crate::pipeline::vision::VisionFallback;

/// Anything that can turn a receipt image into an `ExtractionResult`.
pub trait ReceiptAnalyzer {
    fn analyze_file(&self, image_path: &Path) -> Result<ExtractionResult, ExtractionError>;

    /// Whether the text recognition engine can run.
    fn ocr_available(&self) -> bool;
}

/// OCR first, vision model only when the textual result is weak.
/// Uses trait objects for both engines, enabling dependency injection.
pub struct ReceiptExtractor {
    ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    vision: Option<VisionFallback>,
}

impl ReceiptExtractor {
    pub fn new(ocr_engine: Box<dyn OcrEngine + Send + Sync>) -> Self {
        Self {
            ocr_engine,
            vision: None,
        }
    }

    pub fn with_vision(mut self, vision: VisionFallback) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Run the full pipeline on encoded image bytes.
    ///
    /// Decode and OCR engine failures propagate. Vision failures never do.
    pub fn extract(&self, image_bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let _span = tracing::info_span!("receipt_extraction", bytes = image_bytes.len()).entered();

        // Step 1: normalize, recognize, classify
        let normalized = normalize_to_png(image_bytes)?;
        let recognized = recognize_text(self.ocr_engine.as_ref(), &normalized)?;
        tracing::info!(
            chars = recognized.text.len(),
            lang = recognized.lang,
            psm = recognized.psm.as_arg(),
            "OCR pass complete"
        );
        let ocr_result = classify_text(&recognized.text);

        // Step 2: confident OCR result is final
        if matches!(ocr_result.confidence, ConfidenceTier::High | ConfidenceTier::Medium) {
            tracing::info!(confidence = ocr_result.confidence.as_str(), "Using OCR result");
            return Ok(ocr_result);
        }

        // Step 3: no usable vision model
        let vision = match &self.vision {
            Some(vision) if vision.is_available() => vision,
            _ => {
                tracing::warn!(
                    confidence = ocr_result.confidence.as_str(),
                    "Vision model unavailable, returning OCR result"
                );
                return Ok(ocr_result);
            }
        };

        // Step 4: vision model on the original bytes
        tracing::info!(
            confidence = ocr_result.confidence.as_str(),
            "Weak OCR result, trying vision model"
        );
        let vision_result = vision.extract(image_bytes);
        if vision_result.is_valid_receipt {
            return Ok(vision_result);
        }

        // Step 5: neither is valid, keep whichever found an amount
        if ocr_result.has_amount() {
            tracing::info!("Vision result invalid, OCR result has an amount");
            return Ok(ocr_result);
        }
        Ok(vision_result)
    }

    /// Read an image from disk and run the pipeline.
    pub fn extract_file(&self, image_path: &Path) -> Result<ExtractionResult, ExtractionError> {
        let bytes = std::fs::read(image_path)?;
        tracing::info!(
            file = %image_path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            "Analyzing receipt image"
        );
        self.extract(&bytes)
    }
}

impl ReceiptAnalyzer for ReceiptExtractor {
    fn analyze_file(&self, image_path: &Path) -> Result<ExtractionResult, ExtractionError> {
        self.extract_file(image_path)
    }

    fn ocr_available(&self) -> bool {
        self.ocr_engine.is_available()
    }
}
