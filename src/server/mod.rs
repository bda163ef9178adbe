pub mod handlers;
pub mod middleware;
pub mod response;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderValue,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_io_timeout::TimeoutStream;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerPolicy;
use crate::error::GatewayError;
use crate::ingest::{ImageSource, Ingestion};
use crate::ocr::OcrBackend;
use tracing::{debug, warn};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    ingestion: Ingestion,
    backend: Arc<dyn OcrBackend>,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(ingestion: Ingestion, backend: Arc<dyn OcrBackend>, policy: &ServerPolicy) -> Self {
        Self {
            ingestion,
            backend,
            max_body_bytes: policy.max_body_bytes,
        }
    }

    /// Resolve the image and run it through the backend.
    async fn recognize(&self, source: ImageSource) -> Result<String, GatewayError> {
        let image = self.ingestion.resolve(source).await?;
        self.backend
            .recognize(image)
            .await
            .map_err(|e| GatewayError::Internal(format!("{:#}", e)))
    }
}

pub fn router(state: AppState, policy: &ServerPolicy) -> Router {
    let policy = Arc::new(policy.clone());

    // Layers listed innermost first
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/version", get(handlers::version))
        .route("/api/ocr", post(handlers::ocr_upload))
        .route("/api/ocr/base64", post(handlers::ocr_base64))
        .route("/api/ocr/url", post(handlers::ocr_url))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(policy.max_body_bytes))
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(from_fn_with_state(policy.clone(), middleware::json_envelope))
        .layer(ResponseBodyTimeoutLayer::new(policy.write_timeout))
        .layer(RequestBodyTimeoutLayer::new(policy.read_timeout))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::RequestSpan)
                .on_request(())
                .on_response(middleware::AccessLog)
                .on_body_chunk(())
                .on_eos(())
                .on_failure(()),
        )
        .with_state(state)
}

/// Accept and serve connections; never returns.
///
/// Every socket read and write is bounded by the policy timeouts, so a client
/// that stalls mid-headers or stops reading its response is dropped.
pub async fn serve(listener: TcpListener, app: Router, policy: &ServerPolicy) {
    let read_timeout = policy.read_timeout;
    let write_timeout = policy.write_timeout;

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                continue;
            }
        };

        let mut stream = TimeoutStream::new(stream);
        stream.set_read_timeout(Some(read_timeout));
        stream.set_write_timeout(Some(write_timeout));
        let io = TokioIo::new(Box::pin(stream));
        let service = TowerToHyperService::new(app.clone());

        tokio::spawn(async move {
            let mut builder = Builder::new(TokioExecutor::new());
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(read_timeout);
            if let Err(e) = builder.serve_connection(io, service).await {
                debug!("Connection from {} closed: {}", peer, e);
            }
        });
    }
}
