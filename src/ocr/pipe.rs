//! PaddleOCR-json engine driven over stdin/stdout.
//!
//! The engine is launched once and kept alive. Each request is one line of
//! JSON in (`{"image_base64": ...}`) and one line of JSON out.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::ImageOutputFormat;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::OcrBackend;
use crate::decoder::DecodedImage;

/// Line printed by the engine once models are loaded.
const READY_MARKER: &str = "OCR init completed.";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub startup_timeout: Duration,
}

struct EngineIo {
    // Held so the process is killed when the engine is dropped
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

pub struct PipeEngine {
    io: Arc<Mutex<EngineIo>>,
}

impl PipeEngine {
    /// Launch the engine and wait until it reports ready.
    pub async fn spawn(config: &EngineConfig) -> Result<Self> {
        info!("Launching OCR engine: {:?} {:?}", config.path, config.args);

        let mut command = Command::new(&config.path);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to launch OCR engine {:?}", config.path))?;
        let stdin = child.stdin.take().context("OCR engine stdin unavailable")?;
        let stdout = child.stdout.take().context("OCR engine stdout unavailable")?;
        let mut stdout = BufReader::new(stdout).lines();

        tokio::time::timeout(config.startup_timeout, wait_until_ready(&mut stdout))
            .await
            .with_context(|| {
                format!(
                    "OCR engine not ready after {}s",
                    config.startup_timeout.as_secs()
                )
            })??;

        Ok(Self {
            io: Arc::new(Mutex::new(EngineIo {
                _child: child,
                stdin,
                stdout,
            })),
        })
    }
}

async fn wait_until_ready(stdout: &mut Lines<BufReader<ChildStdout>>) -> Result<()> {
    while let Some(line) = stdout.next_line().await? {
        debug!("engine: {}", line);
        if line.contains(READY_MARKER) {
            return Ok(());
        }
    }
    bail!("OCR engine exited before initialization completed")
}

fn encode_png_base64(image: &DecodedImage) -> Result<String> {
    let mut png = Vec::new();
    image
        .raster()
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .context("Failed to encode image for OCR engine")?;
    Ok(BASE64.encode(png))
}

async fn exchange(io: Arc<Mutex<EngineIo>>, request: String) -> Result<String> {
    let mut io = io.lock().await;
    io.stdin
        .write_all(request.as_bytes())
        .await
        .context("Failed to write to OCR engine")?;
    io.stdin.flush().await.context("Failed to write to OCR engine")?;

    while let Some(line) = io
        .stdout
        .next_line()
        .await
        .context("Failed to read from OCR engine")?
    {
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
    bail!("OCR engine exited unexpectedly")
}

#[async_trait::async_trait]
impl OcrBackend for PipeEngine {
    fn name(&self) -> &str {
        "paddleocr_json"
    }

    async fn recognize(&self, image: DecodedImage) -> Result<String> {
        let encoded = tokio::task::spawn_blocking(move || encode_png_base64(&image)).await??;

        let mut request = serde_json::json!({ "image_base64": encoded }).to_string();
        request.push('\n');

        // Run detached: a dropped request must not leave a reply unread on the pipe
        tokio::spawn(exchange(self.io.clone(), request)).await?
    }
}
