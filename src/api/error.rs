//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Request validation errors with HTTP status mapping.
///
/// Pipeline failures are not `ApiError`s: they are answered with a failed
/// extraction record so clients always parse the same shape.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image file provided")]
    MissingImage,
    #[error("No file selected")]
    EmptyFilename,
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),
    #[error("Image exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::MissingImage => (
                StatusCode::BAD_REQUEST,
                "NO_IMAGE",
                "No image file provided".to_string(),
            ),
            ApiError::EmptyFilename => (
                StatusCode::BAD_REQUEST,
                "NO_FILE_SELECTED",
                "No file selected".to_string(),
            ),
            ApiError::InvalidFileType(ext) => (
                StatusCode::BAD_REQUEST,
                "INVALID_FILE_TYPE",
                format!("Invalid file type: {ext}"),
            ),
            ApiError::InvalidImageData(detail) => (
                StatusCode::BAD_REQUEST,
                "INVALID_IMAGE_DATA",
                detail.clone(),
            ),
            ApiError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Image exceeds the {limit} byte limit"),
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn missing_image_returns_400() {
        let response = ApiError::MissingImage.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NO_IMAGE");
        assert_eq!(json["error"]["message"], "No image file provided");
    }

    #[tokio::test]
    async fn invalid_type_names_the_extension() {
        let response = ApiError::InvalidFileType("pdf".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_FILE_TYPE");
        assert_eq!(json["error"]["message"], "Invalid file type: pdf");
    }

    #[tokio::test]
    async fn payload_too_large_returns_413() {
        let response = ApiError::PayloadTooLarge { limit: 10 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let response = ApiError::Internal("worker panicked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
