//! Wave-based resource resolution.
//!
//! Resources are split into consecutive waves of at most `batch_size`
//! entries. Every fetch in a wave runs concurrently on the calling task and
//! the resolver waits for the whole wave before starting the next one.
//! Results are emitted in submission order, never completion order, so the
//! archive layout is identical across runs.

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::retry::{RetryDecision, classify_error};
use super::{FetchError, Fetcher, ResourceError};
use crate::assets::ResourceKind;
use crate::config::NetworkPolicy;
use crate::logging::Logger;
use crate::package::OutputFile;

/// A resource to fetch and the archive path its payload lands at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub url: String,
    pub archive_path: String,
}

impl ResourceRequest {
    pub fn new(
        kind: ResourceKind,
        url: impl Into<String>,
        archive_path: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            archive_path: archive_path.into(),
        }
    }
}

/// Outcome of resolving one resource.
#[derive(Debug)]
pub enum Resolution {
    /// Payload fetched successfully.
    Fetched(Vec<u8>),
    /// Every attempt failed but policy tolerates it; the payload is empty.
    Tolerated(FetchError),
}

impl Resolution {
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Self::Fetched(bytes) => bytes,
            Self::Tolerated(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_tolerated(&self) -> bool {
        matches!(self, Self::Tolerated(_))
    }
}

/// Fetches resources in bounded waves with per-resource retry.
pub struct ResourceResolver<'a> {
    fetcher: &'a dyn Fetcher,
    policy: &'a NetworkPolicy,
    logger: &'a Logger,
}

impl<'a> ResourceResolver<'a> {
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher, policy: &'a NetworkPolicy, logger: &'a Logger) -> Self {
        Self {
            fetcher,
            policy,
            logger,
        }
    }

    /// Resolves every request, returning output files in submission order.
    ///
    /// # Errors
    ///
    /// Returns the first (in submission order) [`ResourceError`] of the first
    /// failing wave when failure tolerance is off. Sibling fetches in that
    /// wave still run to completion before the error is returned, and no
    /// later wave is started.
    #[instrument(skip(self, requests), fields(count = requests.len(), batch_size = self.policy.batch_size))]
    pub async fn resolve_all(
        &self,
        requests: &[ResourceRequest],
    ) -> Result<Vec<OutputFile>, ResourceError> {
        let batch_size = self.policy.batch_size.max(1);
        let mut files = Vec::with_capacity(requests.len());

        for (wave_index, wave) in requests.chunks(batch_size).enumerate() {
            debug!(wave = wave_index, size = wave.len(), "starting wave");
            let results = join_all(wave.iter().map(|request| self.resolve_one(request))).await;

            for (request, result) in wave.iter().zip(results) {
                let resolution = result?;
                files.push(OutputFile::new(
                    request.archive_path.clone(),
                    resolution.into_payload(),
                ));
            }
        }

        info!(files = files.len(), "resources resolved");
        Ok(files)
    }

    /// Resolves a single resource with retry and the tolerance fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] when the final attempt fails and failure
    /// tolerance is off.
    #[instrument(skip(self, request), fields(kind = %request.kind, url = %request.url))]
    pub async fn resolve_one(
        &self,
        request: &ResourceRequest,
    ) -> Result<Resolution, ResourceError> {
        match self.fetch_with_retry(&request.url).await {
            Ok(bytes) => {
                self.logger
                    .log(&format!("Downloaded {} {}", request.kind, request.url));
                Ok(Resolution::Fetched(bytes))
            }
            Err((error, attempts)) => {
                if self.policy.ignore_failed_downloads {
                    warn!(
                        attempts,
                        error = %error,
                        "download failed; continuing with empty payload"
                    );
                    self.logger.warn(&format!(
                        "Warning ({} {}): Download failed: {error}",
                        request.kind, request.url
                    ));
                    Ok(Resolution::Tolerated(error))
                } else {
                    Err(ResourceError {
                        kind: request.kind,
                        url: request.url.clone(),
                        attempts,
                        source: error,
                    })
                }
            }
        }
    }

    /// Runs attempts until success or the retry policy gives up.
    ///
    /// Each attempt is bounded by the fetch timeout; expiry counts as a
    /// transient failure.
    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>, (FetchError, u32)> {
        let retry = &self.policy.retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            let outcome =
                tokio::time::timeout(self.policy.fetch_timeout, self.fetcher.fetch(url))
                    .await
                    .unwrap_or_else(|_| Err(FetchError::timeout(url)));

            let error = match outcome {
                Ok(resource) => return Ok(resource.bytes),
                Err(error) => error,
            };

            match retry.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    let times = if attempt == 1 { "time" } else { "times" };
                    self.logger.log(&format!(
                        "Failed to fetch `{url}` {attempt} {times}. Retrying..."
                    ));
                    debug!(
                        next_attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    if attempt < retry.max_attempts() {
                        self.logger.log(&format!(
                            "Failed to fetch `{url}`: {error}. Not retrying."
                        ));
                    }
                    debug!(%reason, "not retrying fetch");
                    return Err((error, attempt));
                }
            }
        }
    }
}
