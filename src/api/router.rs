//! Service router.
//!
//! Returns a composable `Router`; `server.rs` mounts it on a listener and
//! the tests drive it directly with `oneshot`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Headroom for multipart framing and JSON wrapping around the image.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the service router.
pub fn service_router(ctx: ApiContext) -> Router {
    let body_limit = request_body_limit(ctx.config.max_upload_bytes);

    Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/analyze", post(endpoints::analyze::upload))
        .route("/analyze/base64", post(endpoints::analyze::base64))
        .with_state(ctx)
        // Extractor limit off; the transport-level limit below covers both routes.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Largest accepted request body: base64 inflates the image by 4/3.
fn request_body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes.saturating_mul(4) / 3 + BODY_OVERHEAD_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::api::types::test_support::{context, StubAnalyzer};
    use crate::config::ServiceConfig;
    use crate::pipeline::extraction::{ConfidenceTier, ExtractionMethod, ExtractionResult, FieldSet};

    const BOUNDARY: &str = "voucher-test-boundary";

    fn yape_result() -> ExtractionResult {
        ExtractionResult {
            confidence: ConfidenceTier::High,
            extraction_method: ExtractionMethod::Ocr,
            fields: FieldSet {
                bank: Some("Yape".into()),
                payment_method: Some("Yape".into()),
                amount: Some(50.0),
                currency: Some("PEN".into()),
                operation_code: Some("12345678".into()),
                ..Default::default()
            },
            is_valid_receipt: true,
            is_legible: true,
            raw_text: "Yape S/ 50.00".into(),
            error: None,
        }
    }

    fn multipart_request(field: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_service_and_ocr_state() {
        let app = service_router(context(Arc::new(StubAnalyzer::returning(yape_result()))));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], crate::config::APP_NAME);
        assert_eq!(json["ocr_available"], true);
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn upload_returns_flat_record() {
        let analyzer = Arc::new(StubAnalyzer::returning(yape_result()));
        let app = service_router(context(analyzer.clone()));

        let response = app
            .oneshot(multipart_request("image", "yape.PNG", b"fake image bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["confidence"], "high");
        assert_eq!(json["extraction_method"], "ocr");
        assert_eq!(json["monto"], 50.0);
        assert_eq!(json["codigo_operacion"], "12345678");
        assert_eq!(json["es_recibo_valido"], true);
        assert!(json.get("error").is_none());

        let seen = analyzer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (path, contents) = &seen[0];
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(contents.as_slice(), b"fake image bytes");
        assert!(!path.exists(), "staged file must be removed");
    }

    #[tokio::test]
    async fn upload_without_image_field_is_rejected() {
        let app = service_router(context(Arc::new(StubAnalyzer::returning(yape_result()))));
        let response = app
            .oneshot(multipart_request("document", "yape.png", b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NO_IMAGE");
    }

    #[tokio::test]
    async fn upload_with_bad_extension_is_rejected() {
        let analyzer = Arc::new(StubAnalyzer::returning(yape_result()));
        let app = service_router(context(analyzer.clone()));
        let response = app
            .oneshot(multipart_request("image", "voucher.pdf", b"%PDF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_FILE_TYPE");
        assert!(analyzer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_over_limit_is_rejected() {
        let config = ServiceConfig {
            max_upload_bytes: 16,
            ..ServiceConfig::default()
        };
        let analyzer = Arc::new(StubAnalyzer::returning(yape_result()));
        let app = service_router(crate::api::ApiContext::new(Arc::new(config), analyzer));
        let response = app
            .oneshot(multipart_request("image", "big.jpg", &[0u8; 100]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn pipeline_error_returns_500_with_failed_record() {
        let app = service_router(context(Arc::new(StubAnalyzer::failing("tesseract crashed"))));
        let response = app
            .oneshot(multipart_request("image", "yape.jpg", b"bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["confidence"], "none");
        assert_eq!(json["extraction_method"], "failed");
        assert_eq!(json["es_recibo_valido"], false);
        assert!(json["error"].as_str().unwrap().contains("tesseract crashed"));
    }

    #[tokio::test]
    async fn base64_endpoint_runs_pipeline() {
        let analyzer = Arc::new(StubAnalyzer::returning(yape_result()));
        let app = service_router(context(analyzer.clone()));
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"jpeg bytes");

        let response = app
            .oneshot(json_request("/analyze/base64", serde_json::json!({ "image": encoded })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["bank"], "Yape");

        let seen = analyzer.seen.lock().unwrap();
        assert_eq!(seen[0].0.extension().unwrap(), "jpg");
        assert_eq!(seen[0].1.as_slice(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn base64_endpoint_validates_input() {
        let app = service_router(context(Arc::new(StubAnalyzer::returning(yape_result()))));

        let response = app
            .clone()
            .oneshot(json_request("/analyze/base64", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "NO_IMAGE");

        let response = app
            .clone()
            .oneshot(json_request(
                "/analyze/base64",
                serde_json::json!({ "image": "@@@", "ext": "png" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_IMAGE_DATA");

        let response = app
            .oneshot(json_request(
                "/analyze/base64",
                serde_json::json!({ "image": "aGk=", "ext": "exe" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_FILE_TYPE");
    }

    #[test]
    fn body_limit_allows_base64_inflation() {
        assert_eq!(request_body_limit(3), 4 + BODY_OVERHEAD_BYTES);
        assert!(request_body_limit(15 * 1024 * 1024) > 20 * 1024 * 1024);
    }
}
