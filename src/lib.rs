//! EPUB package assembly.
//!
//! `epubgen` turns a metadata record and an ordered list of HTML chapters
//! into a complete EPUB 2 or EPUB 3 container.
//!
//! # Architecture
//!
//! The build runs as a fixed sequence of stages:
//! - [`normalize`] - validates options and chapters, applies defaults
//! - [`sanitize`] - attribute allowlist and image discovery per chapter
//! - [`template`] - package document, navigation, and chapter rendering
//! - [`fetch`] - fonts, images, and cover fetched in bounded waves with retry
//! - [`package`] - stage orchestration and the zip archiver
//!
//! # Example
//!
//! ```no_run
//! use epubgen::{EpubOptions, RawChapter};
//!
//! # async fn example() -> Result<(), epubgen::BuildError> {
//! let mut options = EpubOptions::titled("Alice's Adventures in Wonderland");
//! options.author = Some("Lewis Carroll".into());
//! let chapters = vec![RawChapter::new(
//!     "Down the Rabbit-Hole",
//!     "<p>Alice was beginning to get very tired...</p>",
//! )];
//! let bytes = epubgen::build(options, &chapters).await?;
//! std::fs::write("alice.epub", bytes).ok();
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod package;
pub mod sanitize;
pub mod template;
pub mod text;

// Re-export commonly used types
pub use config::{
    BuildConfig, DEFAULT_BATCH_SIZE, DEFAULT_FETCH_TIMEOUT, DEFAULT_RETRY_TIMES, EpubOptions,
    FontOption, RawChapter,
};
pub use error::BuildError;
pub use fetch::{Fetcher, HttpFetcher, ResourceError};
pub use logging::{LogLevel, LogPolicy};
pub use normalize::ValidationError;
pub use package::{EpubBuilder, OutputFile};
pub use sanitize::MarkupError;
pub use template::TemplateError;

/// Builds a package with the default HTTP fetcher and built-in templates.
///
/// # Errors
///
/// Returns the first fatal [`BuildError`]: invalid input, unusable chapter
/// markup, a template failure, or a resource that could not be downloaded
/// while failure tolerance is off.
pub async fn build(options: EpubOptions, chapters: &[RawChapter]) -> Result<Vec<u8>, BuildError> {
    EpubBuilder::new(options, chapters)?.build().await
}
