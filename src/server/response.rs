//! JSON bodies produced by the gateway itself.
//!
//! Everything here is `application/json`; OCR results are either re-encoded
//! from a parsed document or passed through as the engine produced them.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ocr::OcrOutput;

pub const SERVICE_NAME: &str = "PaddleOCR-json";
pub const API_VERSION: &str = "v1";
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// The only error shape this gateway emits.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            error: message.into(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: u64,
}

impl HealthResponse {
    pub fn ok() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            status: "ok",
            version: VERSION,
            timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub api_version: &'static str,
}

impl VersionResponse {
    pub fn current() -> Self {
        Self {
            name: SERVICE_NAME,
            version: VERSION,
            api_version: API_VERSION,
        }
    }
}

/// A 200 whose JSON body is already serialized.
pub fn raw_json(body: String) -> Response {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response()
}

impl IntoResponse for OcrOutput {
    fn into_response(self) -> Response {
        match self {
            OcrOutput::Json(value) => (StatusCode::OK, Json(value)).into_response(),
            OcrOutput::Raw(text) => raw_json(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = ErrorResponse::new(StatusCode::PAYLOAD_TOO_LARGE, "too big").into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_text(response).await, r#"{"code":413,"error":"too big"}"#);
    }

    #[tokio::test]
    async fn test_parsed_output_is_reserialized() {
        let output = OcrOutput::normalized("{ \"code\" : 100,\n \"data\": [] }".to_string());
        let response = output.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"code":100,"data":[]}"#);
    }

    #[tokio::test]
    async fn test_raw_output_is_verbatim() {
        let response = OcrOutput::normalized("engine said hi".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(body_text(response).await, "engine said hi");
    }

    #[test]
    fn test_version_string() {
        assert_eq!(VERSION, concat!("v", env!("CARGO_PKG_VERSION")));
        let version = VersionResponse::current();
        assert_eq!(version.name, "PaddleOCR-json");
        assert_eq!(version.api_version, "v1");
    }
}
