//! Vision-model fallback for receipts the OCR path could not grade.
//!
//! Never returns an error: every failure becomes a `failed` record so the
//! orchestrator can reconcile it with the textual result.

use base64::Engine;

use super::ollama::VisionClient;
use super::ollama_types::{has_model, VisionGenerateRequest, VisionGenerationOptions};
use super::parser::parse_vision_response;
use super::prompt::EXTRACTION_PROMPT;
use super::VisionError;
use crate::pipeline::extraction::{
    truncate_raw_text, ConfidenceTier, ExtractionMethod, ExtractionResult,
};

pub struct VisionFallback {
    client: Box<dyn VisionClient + Send + Sync>,
    model: String,
}

impl VisionFallback {
    pub fn new(client: Box<dyn VisionClient + Send + Sync>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Probe the model listing. Checked on every call, never cached.
    pub fn is_available(&self) -> bool {
        match self.client.list_models() {
            Ok(models) => {
                let available = has_model(&models, &self.model);
                tracing::info!(model = %self.model, available, "Vision model probe");
                available
            }
            Err(e) => {
                tracing::warn!(error = %e, "Vision model service not reachable");
                false
            }
        }
    }

    /// Ask the model to read the original (non-normalized) image bytes.
    pub fn extract(&self, image_bytes: &[u8]) -> ExtractionResult {
        let _span = tracing::info_span!("vision_fallback", model = %self.model).entered();

        match self.try_extract(image_bytes) {
            Ok(result) => {
                tracing::info!(
                    valid = result.is_valid_receipt,
                    amount = ?result.fields.amount,
                    "Vision model extraction complete"
                );
                result
            }
            Err(e) => {
                tracing::error!(error = %e, "Vision model extraction failed");
                ExtractionResult::failed(e.to_string())
            }
        }
    }

    fn try_extract(&self, image_bytes: &[u8]) -> Result<ExtractionResult, VisionError> {
        let request = VisionGenerateRequest {
            model: self.model.clone(),
            prompt: EXTRACTION_PROMPT.to_string(),
            images: vec![base64::engine::general_purpose::STANDARD.encode(image_bytes)],
            stream: false,
            options: Some(VisionGenerationOptions::extraction()),
        };

        let response = self.client.generate_with_images(&request)?;
        let preview: String = response.chars().take(200).collect();
        tracing::debug!(chars = response.len(), preview = %preview, "Vision model response");

        let parsed = parse_vision_response(&response)?;

        Ok(ExtractionResult {
            confidence: ConfidenceTier::VisionFallback,
            extraction_method: ExtractionMethod::VisionFallback,
            fields: parsed.fields,
            is_valid_receipt: parsed.is_valid_receipt,
            is_legible: parsed.is_legible,
            raw_text: truncate_raw_text(response.trim()),
            error: None,
        })
    }
}
