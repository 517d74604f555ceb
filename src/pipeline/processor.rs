//! Wires `ServiceConfig` into a live `ReceiptExtractor`.
//!
//! The blocking HTTP client inside the vision fallback must be built on the
//! thread that uses it, so `ServiceAnalyzer` constructs a fresh extractor per
//! request from the shared, immutable configuration.

use std::path::Path;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::pipeline::extraction::ocr::TesseractCli;
use crate::pipeline::extraction::types::OcrEngine;
use crate::pipeline::extraction::{ExtractionError, ExtractionResult, ReceiptAnalyzer, ReceiptExtractor};
use crate::pipeline::vision::{OllamaClient, VisionFallback};

/// Build the OCR engine from configuration.
pub fn build_ocr_engine(config: &ServiceConfig) -> Box<dyn OcrEngine + Send + Sync> {
    Box::new(TesseractCli::new(&config.tesseract_cmd))
}

/// Build the full extractor. A vision client that cannot be constructed
/// disables the fallback rather than failing the request.
pub fn build_extractor(config: &ServiceConfig) -> ReceiptExtractor {
    let extractor = ReceiptExtractor::new(build_ocr_engine(config));
    match OllamaClient::new(&config.ollama_url) {
        Ok(client) => {
            extractor.with_vision(VisionFallback::new(Box::new(client), &config.vision_model))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Vision fallback disabled");
            extractor
        }
    }
}

/// Production analyzer used by the HTTP layer.
pub struct ServiceAnalyzer {
    config: Arc<ServiceConfig>,
}

impl ServiceAnalyzer {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }
}

impl ReceiptAnalyzer for ServiceAnalyzer {
    fn analyze_file(&self, image_path: &Path) -> Result<ExtractionResult, ExtractionError> {
        build_extractor(&self.config).extract_file(image_path)
    }

    fn ocr_available(&self) -> bool {
        build_ocr_engine(&self.config).is_available()
    }
}
