//! Gateway configuration.
//!
//! Read once at startup from the environment (after `.env` is loaded).
//! Limits and timeouts are fixed defaults carried in [`ServerPolicy`].

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::MIB;
use crate::fetcher::FetchConfig;
use crate::ocr::pipe::EngineConfig;

/// Limits applied to every request. Immutable once the router is built.
#[derive(Debug, Clone)]
pub struct ServerPolicy {
    pub max_body_bytes: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ServerPolicy {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * MIB,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub policy: ServerPolicy,
    pub fetch: FetchConfig,
    pub engine: EngineConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let engine = EngineConfig {
            path: PathBuf::from(env_or("OCR_ENGINE_PATH", "PaddleOCR-json".to_string())?),
            args: std::env::var("OCR_ENGINE_ARGS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            working_dir: std::env::var_os("OCR_ENGINE_DIR").map(PathBuf::from),
            startup_timeout: Duration::from_secs(env_or("OCR_ENGINE_STARTUP_SECS", 60)?),
        };

        Ok(Self {
            host: env_or("OCR_HOST", "127.0.0.1".to_string())?,
            port: env_or("OCR_PORT", 8080)?,
            policy: ServerPolicy::default(),
            fetch: FetchConfig::default(),
            engine,
        })
    }
}

/// Parse `key` from the environment, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
