//! Cross-cutting request policy: JSON envelope for framework responses,
//! early payload rejection, panic containment and the access log.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{
        header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, Method, Request as HttpRequest, Response as HttpResponse, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::{info, Span};

use super::response::ErrorResponse;
use crate::config::ServerPolicy;
use crate::error::GatewayError;

/// Longest framework error body carried over into the envelope.
const MAX_REWRITE_BYTES: usize = 64 * 1024;

/// Guarantees every response is JSON and rejects oversized bodies before any
/// extractor runs.
pub async fn json_envelope(
    State(policy): State<Arc<ServerPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        )
            .into_response();
    }

    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > policy.max_body_bytes) {
        return GatewayError::PayloadTooLarge {
            what: "Request body",
            limit: policy.max_body_bytes,
        }
        .into_response();
    }

    let response = next.run(request).await;
    if is_json(&response) {
        response
    } else {
        into_envelope(response).await
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Rewrite a non-JSON response (axum rejections, 405s) into the envelope.
async fn into_envelope(response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let status = parts.status;

    if !status.is_client_error() && !status.is_server_error() {
        parts
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        return Response::from_parts(parts, body);
    }

    let text = to_bytes(body, MAX_REWRITE_BYTES)
        .await
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .unwrap_or_default();
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    } else {
        text
    };

    let mut rewritten = ErrorResponse::new(status, message).into_response();
    if let Some(allow) = parts.headers.remove(ALLOW) {
        rewritten.headers_mut().insert(ALLOW, allow);
    }
    rewritten
}

/// `CatchPanicLayer` hook: a panicking handler still answers with a 500 envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    GatewayError::Internal(detail).into_response()
}

/// Span carrying method and path for the access-log line.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &HttpRequest<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// The single access-log line per request.
#[derive(Debug, Clone, Copy)]
pub struct AccessLog;

impl<B> OnResponse<B> for AccessLog {
    fn on_response(self, response: &HttpResponse<B>, latency: Duration, _span: &Span) {
        info!(
            status = response.status().as_u16(),
            duration_ms = latency.as_millis() as u64,
            "request completed"
        );
    }
}
