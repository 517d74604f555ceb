//! Shared types for the HTTP layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::pipeline::extraction::ReceiptAnalyzer;

/// Extensions accepted for uploaded receipt images.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Extension assumed for base64 payloads that do not name one.
pub const DEFAULT_BASE64_EXT: &str = "jpg";

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared state for all routes. The analyzer is a trait object so routes can
/// be exercised without Tesseract or Ollama.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<ServiceConfig>,
    pub analyzer: Arc<dyn ReceiptAnalyzer + Send + Sync>,
}

impl ApiContext {
    pub fn new(config: Arc<ServiceConfig>, analyzer: Arc<dyn ReceiptAnalyzer + Send + Sync>) -> Self {
        Self { config, analyzer }
    }
}

// ═══════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub ocr_available: bool,
    pub version: String,
}

/// `POST /analyze/base64` body. `image` may also be a `data:` URL.
#[derive(Debug, Deserialize)]
pub struct Base64AnalyzeRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_ext")]
    pub ext: String,
}

fn default_ext() -> String {
    DEFAULT_BASE64_EXT.to_string()
}

// ═══════════════════════════════════════════════════════════
// Test support
// ═══════════════════════════════════════════════════════════


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_allowed_extension("JPG"));
        assert!(is_allowed_extension("webp"));
        assert!(!is_allowed_extension("pdf"));
        assert!(!is_allowed_extension(""));
    }

    #[test]
    fn base64_request_defaults_extension() {
        let req: Base64AnalyzeRequest = serde_json::from_str(r#"{"image":"aGk="}"#).unwrap();
        assert_eq!(req.ext, "jpg");
        assert_eq!(req.image.as_deref(), Some("aGk="));

        let req: Base64AnalyzeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.image.is_none());
    }
}
