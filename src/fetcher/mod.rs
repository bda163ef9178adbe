//! GET-only client for pulling images from caller-supplied URLs.

pub mod url;

use crate::error::MIB;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use self::url::{RemoteUrl, Scheme, UrlError};

/// Every way a remote fetch can fail. Displayed verbatim to API callers.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error("HTTPS not supported (compiled without TLS support)")]
    HttpsUnsupported,
    #[error("Failed to fetch image: HTTP {0}")]
    Status(u16),
    #[error("Failed to fetch image: {0}")]
    Transport(String),
    #[error("Image size exceeds {}MB limit", .limit / MIB)]
    TooLarge { limit: usize },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else if e.is_connect() {
            Self::Transport(format!("connection failed ({})", e))
        } else if e.is_redirect() {
            Self::Transport(format!("too many redirects ({})", e))
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(config: &FetchConfig, max_bytes: usize) -> reqwest::Result<Self> {
        // reqwest 0.11 has no separate read timeout; the total timeout bounds it
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .redirect(reqwest::redirect::Policy::default())
            .user_agent(concat!("ocr-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, max_bytes })
    }

    /// Download the body at `raw_url`. Fails unless the final response is a
    /// 200 with at most `max_bytes` of body.
    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        let target = RemoteUrl::parse(raw_url)?;
        check_transport(&target, cfg!(feature = "tls"))?;

        debug!("GET {}", target);
        let mut response = self.client.get(target.to_string()).send().await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status(status));
        }

        let too_large = FetchError::TooLarge {
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large);
            }
            body.extend_from_slice(&chunk);
        }

        info!("Fetched {} bytes from {}", body.len(), target.host);
        Ok(body)
    }
}

/// https targets need a TLS-enabled build.
fn check_transport(target: &RemoteUrl, tls_enabled: bool) -> Result<(), FetchError> {
    if target.scheme == Scheme::Https && !tls_enabled {
        return Err(FetchError::HttpsUnsupported);
    }
    Ok(())
}
