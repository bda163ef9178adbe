//! OCR Gateway - HTTP front end for the PaddleOCR-json engine.

mod config;
mod decoder;
mod error;
mod fetcher;
mod ingest;
mod ocr;
mod server;

#[cfg(test)]
mod testing;

use anyhow::Context;
use config::GatewayConfig;
use decoder::CodecDecoder;
use fetcher::RemoteFetcher;
use ingest::Ingestion;
use ocr::pipe::PipeEngine;
use ocr::OcrBackend;
use server::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;

    let engine = PipeEngine::spawn(&config.engine)
        .await
        .with_context(|| format!("Failed to start OCR engine {}", config.engine.path.display()))?;
    info!("OCR engine ready: {}", engine.name());

    let fetcher = RemoteFetcher::new(&config.fetch, config.policy.max_body_bytes)
        .context("Failed to build HTTP client")?;
    let ingestion = Ingestion::new(
        Arc::new(CodecDecoder),
        fetcher,
        config.policy.max_body_bytes,
    );

    let state = AppState::new(ingestion, Arc::new(engine), &config.policy);
    let app = server::router(state, &config.policy);

    let listener = bind(&config.host, config.port).await?;
    let addr = listener.local_addr()?;
    info!("PaddleOCR-json HTTP server listening on http://{}", addr);
    info!("  GET  /api/health      - health check");
    info!("  GET  /api/version     - service version");
    info!("  POST /api/ocr         - multipart upload (field 'image')");
    info!("  POST /api/ocr/base64  - JSON {{\"image\": \"<base64>\"}}");
    info!("  POST /api/ocr/url     - JSON {{\"url\": \"<http(s) URL>\"}}");

    server::serve(listener, app, &config.policy).await;

    Ok(())
}

/// Bind `host:port`, retrying on all interfaces if the configured host fails.
async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            warn!("Failed to bind {}:{} ({}), falling back to 0.0.0.0", host, port, e);
            TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("Failed to bind 0.0.0.0:{}", port))
        }
    }
}
