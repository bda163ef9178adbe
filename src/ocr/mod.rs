//! OCR backend abstraction.
//!
//! Defines the [`OcrBackend`] trait the handlers call into and the
//! [`OcrOutput`] variant that decides how a backend reply is rendered.

pub mod pipe;

use crate::decoder::DecodedImage;

/// Async trait implemented by each OCR backend.
///
/// One instance is shared by every in-flight request, so `recognize` may be
/// called concurrently. Backends that are not reentrant must serialize
/// internally (see [`pipe::PipeEngine`]).
#[async_trait::async_trait]
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run OCR on a raster and return the engine's JSON document as text.
    async fn recognize(&self, image: DecodedImage) -> anyhow::Result<String>;
}

/// Backend reply as it will be sent to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutput {
    /// Parsed document, re-serialized on the way out.
    Json(serde_json::Value),
    /// Engine text forwarded byte for byte.
    Raw(String),
}

impl OcrOutput {
    /// Parse `text` so it can be re-serialized; keep it raw when it isn't JSON.
    pub fn normalized(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(text),
        }
    }

    pub fn verbatim(text: String) -> Self {
        Self::Raw(text)
    }
}
