//! Resource fetching: the network boundary, retry policy, and the wave
//! scheduler that turns font, image, and cover URLs into archive files.
//!
//! # Example
//!
//! ```no_run
//! use epubgen::assets::ResourceKind;
//! use epubgen::config::NetworkPolicy;
//! use epubgen::fetch::{HttpFetcher, ResourceRequest, ResourceResolver};
//! use epubgen::logging::Logger;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new()?;
//! let policy = NetworkPolicy::default();
//! let logger = Logger::default();
//! let resolver = ResourceResolver::new(&fetcher, &policy, &logger);
//!
//! let files = resolver
//!     .resolve_all(&[ResourceRequest::new(
//!         ResourceKind::Image,
//!         "https://example.com/figure.png",
//!         "OEBPS/images/image_0.png",
//!     )])
//!     .await?;
//! println!("fetched {} file(s)", files.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod resolver;
mod retry;

pub use client::{CONNECT_TIMEOUT_SECS, FetchedResource, Fetcher, HttpFetcher};
pub use error::{FetchError, ResourceError};
pub use resolver::{Resolution, ResourceRequest, ResourceResolver};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
