//! Network boundary: the [`Fetcher`] trait and its reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, instrument};
use url::Url;

use super::FetchError;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("epubgen/", env!("CARGO_PKG_VERSION"));

/// Raw payload returned by a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, if any.
    pub media_type: Option<String>,
}

/// Retrieves the bytes behind a resource URL.
///
/// One attempt per call; retry and timeout policy live in the resolver.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// [`Fetcher`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Other`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a fetcher with an explicit connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Other`] if the TLS backend cannot be initialized.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::other("<client>", e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| map_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "server returned error status");
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_request_error(url, e))?;

        debug!(bytes = bytes.len(), ?media_type, "fetched resource");
        Ok(FetchedResource {
            bytes: bytes.to_vec(),
            media_type,
        })
    }
}

fn map_request_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::network(url, error)
    }
}
