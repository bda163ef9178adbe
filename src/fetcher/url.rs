//! Minimal `scheme://host[:port][/path]` parser for remote image sources.
//!
//! Deliberately small: only what the fetcher needs to validate a target
//! before any network I/O happens.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Invalid URL scheme. Use http:// or https://")]
    UnsupportedScheme,
    #[error("Invalid URL: missing host")]
    MissingHost,
    #[error("Invalid URL: bad port '{0}'")]
    InvalidPort(String),
    #[error("Invalid URL: malformed host '{0}'")]
    InvalidHost(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// A parsed remote image location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub scheme: Scheme,
    /// Host as written; IPv6 literals keep their brackets.
    pub host: String,
    pub port: u16,
    /// Path plus query, always starting with `/`.
    pub path: String,
}

impl RemoteUrl {
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let input = input.trim();
        let (scheme, rest) = input.split_once("://").ok_or(UrlError::UnsupportedScheme)?;
        let scheme = if scheme.eq_ignore_ascii_case("http") {
            Scheme::Http
        } else if scheme.eq_ignore_ascii_case("https") {
            Scheme::Https
        } else {
            return Err(UrlError::UnsupportedScheme);
        };

        // Fragments never go on the wire
        let rest = rest.split('#').next().unwrap_or_default();

        let (authority, path) = match rest.find(['/', '?']) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let path = match path.chars().next() {
            None => "/".to_string(),
            Some('?') => format!("/{}", path),
            Some(_) => path.to_string(),
        };

        let (host, port) = split_host_port(authority)?;
        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }
        if host.contains(['@', ' ', '\t']) {
            return Err(UrlError::InvalidHost(host.to_string()));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port: port.unwrap_or_else(|| scheme.default_port()),
            path,
        })
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>), UrlError> {
    let (host, port) = if authority.starts_with('[') {
        let end = authority
            .find(']')
            .ok_or_else(|| UrlError::InvalidHost(authority.to_string()))?;
        let host = &authority[..=end];
        match &authority[end + 1..] {
            "" => (host, None),
            tail => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(UrlError::InvalidHost(authority.to_string())),
            },
        }
    } else {
        match authority.split_once(':') {
            // A second colon means an unbracketed IPv6 literal or a doubled port
            Some((_, port)) if port.contains(':') => {
                return Err(UrlError::InvalidHost(authority.to_string()))
            }
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        None => None,
        Some(raw) => Some(
            raw.parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| UrlError::InvalidPort(raw.to_string()))?,
        ),
    };
    Ok((host, port))
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.path
        )
    }
}
