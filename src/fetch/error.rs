//! Error types for resource fetching.

use thiserror::Error;

use crate::assets::ResourceKind;

/// A single failed fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded the configured fetch timeout.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// HTTP error response (4xx, 5xx).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Failure reported by a non-HTTP fetcher.
    #[error("failed to fetch {url}: {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn other(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// A resource whose final attempt failed while failure tolerance was off.
#[derive(Debug, Error)]
#[error("failed to download {kind} {url} after {attempts} attempt(s): {source}")]
pub struct ResourceError {
    pub kind: ResourceKind,
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: FetchError,
}
