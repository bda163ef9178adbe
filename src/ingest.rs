//! Turns one of the three intake shapes into a decoded raster.

use axum::body::Bytes;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::decoder::{DecodedImage, ImageDecoder};
use crate::error::GatewayError;
use crate::fetcher::RemoteFetcher;

const UPLOAD_DECODE_FAILED: &str = "Invalid image format. Supported: JPEG, PNG, BMP, TIFF";
const BASE64_DECODE_FAILED: &str = "Invalid image format";
const URL_DECODE_FAILED: &str = "Failed to download or decode image from URL";

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Where the image bytes come from. Chosen by the endpoint that was hit.
#[derive(Debug, Clone)]
pub enum ImageSource {
    UploadedFile { filename: String, content: Bytes },
    Base64Payload { encoded: String },
    RemoteUrl { url: String },
}

#[derive(Clone)]
pub struct Ingestion {
    decoder: Arc<dyn ImageDecoder>,
    fetcher: RemoteFetcher,
    max_image_bytes: usize,
}

impl Ingestion {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        fetcher: RemoteFetcher,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            decoder,
            fetcher,
            max_image_bytes,
        }
    }

    /// Resolve `source` into a raster. Size limits are checked before the
    /// decoder ever sees the bytes.
    pub async fn resolve(&self, source: ImageSource) -> Result<DecodedImage, GatewayError> {
        match source {
            ImageSource::UploadedFile { filename, content } => {
                info!("Received file: {} ({} bytes)", filename, content.len());
                self.check_size("File size", content.len())?;
                self.decode(content, UPLOAD_DECODE_FAILED).await
            }
            ImageSource::Base64Payload { encoded } => {
                let bytes = decode_base64(&encoded)?;
                self.check_size("Image size", bytes.len())?;
                self.decode(Bytes::from(bytes), BASE64_DECODE_FAILED).await
            }
            ImageSource::RemoteUrl { url } => {
                info!("Fetching image from URL: {}", url);
                let bytes = self.fetcher.fetch(&url).await?;
                self.decode(Bytes::from(bytes), URL_DECODE_FAILED).await
            }
        }
    }

    fn check_size(&self, what: &'static str, len: usize) -> Result<(), GatewayError> {
        if len > self.max_image_bytes {
            return Err(GatewayError::PayloadTooLarge {
                what,
                limit: self.max_image_bytes,
            });
        }
        Ok(())
    }

    async fn decode(
        &self,
        bytes: Bytes,
        failure: &'static str,
    ) -> Result<DecodedImage, GatewayError> {
        let decoder = self.decoder.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(GatewayError::internal)?;

        match decoded {
            Ok(image) => {
                info!("Image decoded: {}x{}", image.width(), image.height());
                Ok(image)
            }
            Err(e) => {
                warn!("Image decode failed: {}", e);
                Err(GatewayError::InvalidImage(failure))
            }
        }
    }
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL, with or without padding.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, GatewayError> {
    let trimmed = encoded.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or(GatewayError::InvalidBase64)?,
        None => trimmed,
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(GatewayError::InvalidBase64);
    }
    LENIENT_BASE64
        .decode(compact)
        .map_err(|_| GatewayError::InvalidBase64)
}
