//! Fixtures shared by the unit tests.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::decoder::{CodecDecoder, DecodeError, DecodedImage, ImageDecoder};
use crate::ocr::OcrBackend;

/// Encode a small gradient image in the given container format.
pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let raster = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 30 % 256) as u8, (y * 50 % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(raster)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("encode test image");
    bytes
}

/// Serve `app` on an ephemeral localhost port.
pub async fn spawn_http(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Serve `total` zero bytes with `Transfer-Encoding: chunked` and no
/// `Content-Length`, in 512-byte chunks, to every connection.
pub async fn spawn_chunked(total: usize) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let mut response =
                    b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
                        .to_vec();
                let mut left = total;
                while left > 0 {
                    let len = left.min(512);
                    response.extend_from_slice(format!("{:x}\r\n", len).as_bytes());
                    response.extend(std::iter::repeat(0u8).take(len));
                    response.extend_from_slice(b"\r\n");
                    left -= len;
                }
                response.extend_from_slice(b"0\r\n\r\n");
                // The client may hang up early once it has seen enough
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

/// Real codec plus a call counter.
#[derive(Default)]
pub struct CountingDecoder {
    pub calls: AtomicUsize,
}

impl CountingDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CodecDecoder.decode(bytes)
    }
}

/// Deterministic backend that reports the raster size it was given.
pub struct DimensionsBackend;

#[async_trait::async_trait]
impl OcrBackend for DimensionsBackend {
    fn name(&self) -> &str {
        "dimensions"
    }

    async fn recognize(&self, image: DecodedImage) -> anyhow::Result<String> {
        Ok(format!(
            r#"{{ "code": 100, "data": [{{"text": "{}x{}"}}] }}"#,
            image.width(),
            image.height()
        ))
    }
}

/// Backend returning a fixed reply or error.
pub struct FixedBackend(pub Result<&'static str, &'static str>);

#[async_trait::async_trait]
impl OcrBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn recognize(&self, _image: DecodedImage) -> anyhow::Result<String> {
        match self.0 {
            Ok(reply) => Ok(reply.to_string()),
            Err(e) => Err(anyhow::anyhow!(e)),
        }
    }
}

/// Backend that panics on every call.
pub struct PanickingBackend;

#[async_trait::async_trait]
impl OcrBackend for PanickingBackend {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn recognize(&self, _image: DecodedImage) -> anyhow::Result<String> {
        panic!("engine crashed")
    }
}
