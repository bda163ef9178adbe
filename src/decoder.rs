//! Image decoder adapter.
//!
//! The only place a [`DecodedImage`] can be constructed. Everything upstream
//! hands bytes in, everything downstream receives a non-empty raster.

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported or corrupt image data: {0}")]
    Codec(#[from] image::ImageError),
    #[error("decoded image is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// A decoded 8-bit RGB raster with non-zero dimensions.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    raster: DynamicImage,
}

impl DecodedImage {
    fn new(raster: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = (raster.width(), raster.height());
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        Ok(Self { raster })
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }
}

/// Seam between ingestion and the codec. Implementations are called from the
/// blocking thread pool.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;
}

/// Decoder backed by the `image` crate (JPEG, PNG, BMP, TIFF and friends).
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecDecoder;

impl ImageDecoder for CodecDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        let raster = image::load_from_memory(bytes)?;
        // Colour decode: alpha and palette information are dropped here
        DecodedImage::new(DynamicImage::ImageRgb8(raster.into_rgb8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::encode_image;
    use image::ImageFormat;

    #[test]
    fn test_decodes_supported_formats() {
        for format in [
            ImageFormat::Png,
            ImageFormat::Jpeg,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
        ] {
            let bytes = encode_image(7, 5, format);
            let decoded = CodecDecoder
                .decode(&bytes)
                .unwrap_or_else(|e| panic!("{:?} failed to decode: {}", format, e));
            assert_eq!((decoded.width(), decoded.height()), (7, 5));
        }
    }

    #[test]
    fn test_output_is_rgb8() {
        let bytes = encode_image(2, 2, ImageFormat::Png);
        let decoded = CodecDecoder.decode(&bytes).unwrap();
        assert!(decoded.raster().as_rgb8().is_some());
    }

    #[test]
    fn test_rejects_garbage() {
        let result = CodecDecoder.decode(b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::Codec(_))));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(CodecDecoder.decode(&[]).is_err());
    }

    #[test]
    fn test_zero_sized_raster_is_rejected() {
        let result = DecodedImage::new(DynamicImage::new_rgb8(0, 4));
        assert!(matches!(
            result,
            Err(DecodeError::Empty {
                width: 0,
                height: 4
            })
        ));
    }
}
