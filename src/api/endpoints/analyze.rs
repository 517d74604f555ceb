//! Receipt analysis endpoints.
//!
//! `POST /analyze` takes a multipart upload (field `image`), `POST /analyze/base64`
//! takes `{image, ext}` JSON. Both stage the bytes in a temp file carrying the
//! original extension and run the pipeline on a blocking worker. The temp file
//! is removed when the worker finishes, on every path.

use std::io::Write;
use std::path::Path;

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;

use crate::api::error::ApiError;
use crate::api::types::{is_allowed_extension, ApiContext, Base64AnalyzeRequest};
use crate::pipeline::extraction::ExtractionResult;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// `POST /analyze`: multipart upload.
pub async fn upload(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let limit = ctx.config.max_upload_bytes;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or(ApiError::MissingImage)?;
    if file_name.is_empty() {
        return Err(ApiError::EmptyFilename);
    }
    let ext = extension_of(&file_name)
        .filter(|ext| is_allowed_extension(ext))
        .ok_or_else(|| ApiError::InvalidFileType(file_name.clone()))?;
    if bytes.len() > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    tracing::info!(%ext, size = bytes.len(), "Receipt upload received");
    Ok(analyze_bytes(&ctx, &bytes, &ext).await)
}

/// `POST /analyze/base64`: JSON body with a base64 image.
pub async fn base64(
    State(ctx): State<ApiContext>,
    payload: Result<Json<Base64AnalyzeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = ctx.config.max_upload_bytes;

    let encoded = request
        .image
        .filter(|data| !data.trim().is_empty())
        .ok_or(ApiError::MissingImage)?;
    let ext = request.ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if !is_allowed_extension(&ext) {
        return Err(ApiError::InvalidFileType(ext));
    }

    let bytes = decode_image_data(&encoded)?;
    if bytes.is_empty() {
        return Err(ApiError::MissingImage);
    }
    if bytes.len() > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    tracing::info!(%ext, size = bytes.len(), "Base64 receipt received");
    Ok(analyze_bytes(&ctx, &bytes, &ext).await)
}

/// Stage the image and run the analyzer on a blocking worker.
///
/// Pipeline failures answer 500 with a failed record rather than an `ApiError`.
async fn analyze_bytes(ctx: &ApiContext, bytes: &[u8], ext: &str) -> Response {
    let file = match stage_image(bytes, ext) {
        Ok(file) => file,
        Err(e) => return failure_response(format!("Failed to stage image: {e}")),
    };

    let analyzer = ctx.analyzer.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = analyzer.analyze_file(file.path());
        drop(file);
        result
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            tracing::info!(
                confidence = result.confidence.as_str(),
                valid = result.is_valid_receipt,
                amount = ?result.fields.amount,
                "Receipt analyzed"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Receipt analysis failed");
            failure_response(e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Analysis worker failed");
            failure_response(format!("Analysis worker failed: {e}"))
        }
    }
}

fn failure_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ExtractionResult::failed(message)),
    )
        .into_response()
}

fn stage_image(bytes: &[u8], ext: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("voucher-")
        .suffix(&format!(".{ext}"))
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Lowercased extension of an uploaded file name.
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Decode plain base64 or a `data:<mime>;base64,<payload>` URL.
fn decode_image_data(data: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match data.trim().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| ApiError::InvalidImageData("Malformed data URL".into()))?,
        None => data.trim(),
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ApiError::InvalidImageData(format!("Invalid base64 image data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("Yape.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("captura.final.png").as_deref(), Some("png"));
        assert_eq!(extension_of("voucher"), None);
    }

    #[test]
    fn decodes_plain_base64_and_data_urls() {
        assert_eq!(decode_image_data("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_image_data("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            decode_image_data("not base64!!"),
            Err(ApiError::InvalidImageData(_))
        ));
        assert!(matches!(
            decode_image_data("data:image/png;base64"),
            Err(ApiError::InvalidImageData(_))
        ));
    }

    #[test]
    fn staged_file_keeps_extension_and_contents() {
        let file = stage_image(b"\x89PNG", "png").unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
        drop(file);
        assert!(!path.exists());
    }
}
