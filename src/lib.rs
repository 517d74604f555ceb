pub mod api;
pub mod config;
pub mod crm; // WispHub customer / debt / payment client
pub mod pipeline;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::ServiceConfig;
use crate::pipeline::extraction::ReceiptAnalyzer;
use crate::pipeline::processor::ServiceAnalyzer;

/// Start the voucher service and serve until Ctrl-C.
pub async fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = Arc::new(ServiceConfig::from_env());
    tracing::info!(
        port = config.port,
        ollama_url = %config.ollama_url,
        vision_model = %config.vision_model,
        tesseract = %config.tesseract_cmd,
        crm_configured = config.wisphub.is_configured(),
        "Configuration loaded"
    );

    let analyzer = Arc::new(ServiceAnalyzer::new(config.clone()));
    let probe = analyzer.clone();
    let ocr_available = tokio::task::spawn_blocking(move || probe.ocr_available())
        .await
        .unwrap_or(false);
    if !ocr_available {
        tracing::warn!("Tesseract not available; every receipt will fail until it is installed");
    }

    let ctx = ApiContext::new(config.clone(), analyzer);
    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), config.port);
    let mut server = api::start_server(ctx, addr).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {e}"))?;

    server.shutdown();
    server.wait().await;
    Ok(())
}
