use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::fetcher::FetchError;
use crate::server::response::ErrorResponse;

pub const MIB: usize = 1024 * 1024;

/// Every failure a handler can end in. Each variant maps to one HTTP status
/// and its `Display` text is the `error` field of the envelope.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No image file provided. Use 'image' field in form data.")]
    MissingImageFile,

    #[error("Missing '{0}' field in JSON body")]
    MissingField(&'static str),

    #[error("Field '{0}' must be a string")]
    FieldNotString(&'static str),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid base64 encoding")]
    InvalidBase64,

    #[error("{0}")]
    InvalidImage(&'static str),

    #[error("{} exceeds {}MB limit", .what, .limit / MIB)]
    PayloadTooLarge { what: &'static str, limit: usize },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } | Self::Fetch(FetchError::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!("{}", message);
        } else {
            warn!("Rejected request ({}): {}", status.as_u16(), message);
        }

        ErrorResponse::new(status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::url::UrlError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::MissingImageFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::InvalidBase64.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::Fetch(FetchError::Status(404)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Fetch(FetchError::Url(UrlError::UnsupportedScheme)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Fetch(FetchError::TooLarge { limit: MIB }).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            GatewayError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        let err = GatewayError::PayloadTooLarge {
            what: "File size",
            limit: 10 * MIB,
        };
        assert_eq!(err.to_string(), "File size exceeds 10MB limit");
        assert_eq!(
            GatewayError::MissingField("url").to_string(),
            "Missing 'url' field in JSON body"
        );
        assert_eq!(
            GatewayError::internal("engine gone").to_string(),
            "Internal server error: engine gone"
        );
        assert_eq!(
            GatewayError::Fetch(FetchError::Status(502)).to_string(),
            "Failed to fetch image: HTTP 502"
        );
    }
}
