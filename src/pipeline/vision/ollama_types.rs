//! Ollama HTTP API contract for vision generation.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Requests
// ──────────────────────────────────────────────

/// Request body for vision-enabled generation via Ollama `/api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct VisionGenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Base64-encoded images, as uploaded (not normalized).
    pub images: Vec<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<VisionGenerationOptions>,
}

/// Generation options tuned for field extraction.
#[derive(Debug, Clone, Serialize)]
pub struct VisionGenerationOptions {
    pub temperature: f32,
    pub num_predict: i32,
}

impl VisionGenerationOptions {
    /// Near-deterministic extraction with room for the full JSON schema.
    pub fn extraction() -> Self {
        Self {
            temperature: 0.1,
            num_predict: 1024,
        }
    }
}

// ──────────────────────────────────────────────
// Responses
// ──────────────────────────────────────────────

/// Response body from Ollama `/api/generate` (non-streaming).
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

/// Response body from Ollama `/api/tags`.
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
pub struct TagModel {
    pub name: String,
}

/// Whether any listed model name contains `wanted` (case-insensitive).
/// `llava` matches `llava:latest`, `llava:13b`, `bakllava`.
pub fn has_model(models: &[String], wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    models.iter().any(|m| m.to_lowercase().contains(&wanted))
}
