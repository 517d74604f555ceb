//! Health check endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, HealthResponse};

/// `GET /health`. Probing the OCR engine spawns a process, so it runs on a
/// blocking worker.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let analyzer = ctx.analyzer.clone();
    let ocr_available = tokio::task::spawn_blocking(move || analyzer.ocr_available())
        .await
        .map_err(|e| ApiError::Internal(format!("OCR probe task failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        service: crate::config::APP_NAME.to_string(),
        ocr_available,
        version: crate::config::APP_VERSION.to_string(),
    }))
}
