use axum::{
    body::Bytes,
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::BytesRejection,
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::warn;

use super::response::{ErrorResponse, HealthResponse, VersionResponse};
use super::AppState;
use crate::error::GatewayError;
use crate::ingest::ImageSource;
use crate::ocr::OcrOutput;

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse::current())
}

/// Multipart upload, file part `image`. The engine reply is re-serialized
/// when it parses as JSON.
pub async fn ocr_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GatewayError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Not a multipart request: {}", e.body_text());
        GatewayError::MissingImageFile
    })?;

    let source = read_image_part(&mut multipart, state.max_body_bytes).await?;
    let text = state.recognize(source).await?;
    Ok(OcrOutput::normalized(text).into_response())
}

/// JSON body `{"image": "<base64>"}`. The engine reply is passed through.
pub async fn ocr_base64(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    let body = buffered(body, state.max_body_bytes)?;
    let encoded = string_field(&body, "image")?;
    let text = state.recognize(ImageSource::Base64Payload { encoded }).await?;
    Ok(OcrOutput::verbatim(text).into_response())
}

/// JSON body `{"url": "<http|https URL>"}`. The engine reply is passed through.
pub async fn ocr_url(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    let body = buffered(body, state.max_body_bytes)?;
    let url = string_field(&body, "url")?;
    let text = state.recognize(ImageSource::RemoteUrl { url }).await?;
    Ok(OcrOutput::verbatim(text).into_response())
}

pub async fn not_found(uri: Uri) -> ErrorResponse {
    ErrorResponse::new(
        StatusCode::NOT_FOUND,
        format!("No route for {}", uri.path()),
    )
}

// ============================================================================
// Request parsing
// ============================================================================

async fn read_image_part(
    multipart: &mut Multipart,
    limit: usize,
) -> Result<ImageSource, GatewayError> {
    let to_gateway = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge {
                what: "File size",
                limit,
            }
        } else {
            GatewayError::BadRequest(format!("Multipart error: {}", e.body_text()))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(to_gateway)? {
        if field.name() != Some("image") {
            continue;
        }
        // Only a file part counts; a plain text field named `image` does not
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field.bytes().await.map_err(to_gateway)?;
        return Ok(ImageSource::UploadedFile { filename, content });
    }

    Err(GatewayError::MissingImageFile)
}

fn buffered(body: Result<Bytes, BytesRejection>, limit: usize) -> Result<Bytes, GatewayError> {
    body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge {
                what: "Request body",
                limit,
            }
        } else {
            GatewayError::BadRequest(e.body_text())
        }
    })
}

/// Pull a required string member out of a JSON object body.
fn string_field(body: &[u8], name: &'static str) -> Result<String, GatewayError> {
    let json: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::InvalidJson(e.to_string()))?;

    match json.get(name) {
        None => Err(GatewayError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(GatewayError::FieldNotString(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_field() {
        assert_eq!(
            string_field(br#"{"url":"http://a/b.png"}"#, "url").unwrap(),
            "http://a/b.png"
        );
    }

    #[test]
    fn test_string_field_errors() {
        assert!(matches!(
            string_field(br#"{"img":"x"}"#, "image"),
            Err(GatewayError::MissingField("image"))
        ));
        assert!(matches!(
            string_field(br#"["image"]"#, "image"),
            Err(GatewayError::MissingField("image"))
        ));
        assert!(matches!(
            string_field(br#"{"image":42}"#, "image"),
            Err(GatewayError::FieldNotString("image"))
        ));
        assert!(matches!(
            string_field(br#"{"image":"#, "image"),
            Err(GatewayError::InvalidJson(_))
        ));
        assert!(matches!(
            string_field(b"", "image"),
            Err(GatewayError::InvalidJson(_))
        ));
    }
}
