//! Caller-facing build options and their normalized form.
//!
//! [`EpubOptions`] and [`RawChapter`] mirror the loosely-typed JSON a caller
//! supplies. The [`normalize`](crate::normalize) module turns them into a
//! [`BuildConfig`] and a list of [`NormalizedChapter`]s, applying the defaults
//! documented on the constants below.

use std::time::Duration;

use serde::Deserialize;

use crate::assets::{CoverAsset, FontAsset};
use crate::fetch::RetryPolicy;
use crate::logging::LogPolicy;

/// Default number of resources fetched concurrently per wave.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default per-attempt fetch timeout (20 seconds).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Default total number of fetch attempts per resource.
pub const DEFAULT_RETRY_TIMES: u32 = 3;

/// Default language tag.
pub const DEFAULT_LANG: &str = "en";

/// Default publisher and author name.
pub const DEFAULT_ANONYMOUS: &str = "anonymous";

/// Default title of the navigation page.
pub const DEFAULT_TOC_TITLE: &str = "Table of Contents";

/// One name or a list of names, as accepted for `author`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Names {
    /// A single name.
    One(String),
    /// Several names in display order.
    Many(Vec<String>),
}

impl Names {
    /// Returns the trimmed, non-empty names.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        let names = match self {
            Self::One(name) => vec![name],
            Self::Many(names) => names,
        };
        names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

impl From<&str> for Names {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<String>> for Names {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

/// A font to embed, as declared by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FontOption {
    /// Target filename under `fonts/`.
    #[serde(default)]
    pub filename: String,
    /// Source URL.
    #[serde(default)]
    pub url: String,
}

/// Raw, caller-supplied package options.
///
/// Numeric knobs are signed so that negative input survives deserialization
/// and is reported as a validation error naming the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpubOptions {
    pub title: String,
    #[serde(alias = "authors")]
    pub author: Option<Names>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub lang: Option<String>,
    pub toc_title: Option<String>,
    #[serde(rename = "tocInTOC")]
    pub toc_in_toc: Option<bool>,
    #[serde(rename = "numberChaptersInTOC")]
    pub number_chapters_in_toc: Option<bool>,
    pub prepend_chapter_titles: Option<bool>,
    pub date: Option<String>,
    pub css: Option<String>,
    pub fonts: Vec<FontOption>,
    pub version: Option<i64>,
    /// Per-attempt timeout in milliseconds.
    pub fetch_timeout: Option<i64>,
    pub retry_times: Option<i64>,
    /// Base delay between attempts in milliseconds.
    pub retry_delay: Option<i64>,
    pub batch_size: Option<i64>,
    pub ignore_failed_downloads: Option<bool>,
    pub verbose: LogPolicy,
}

impl EpubOptions {
    /// Creates options with only a title set.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A caller-supplied content unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawChapter {
    pub title: Option<String>,
    #[serde(alias = "authors")]
    pub author: Option<Names>,
    pub content: Option<String>,
    pub exclude_from_toc: bool,
    pub before_toc: bool,
    pub filename: Option<String>,
    /// Stylesheet text linked from this chapter only.
    pub css: Option<String>,
}

impl RawChapter {
    /// Creates a chapter from a title and markup.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Package format revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpubVersion {
    /// EPUB 2.0.1 (OPF 2, NCX navigation).
    V2,
    /// EPUB 3 (navigation document plus NCX for older readers).
    #[default]
    V3,
}

impl EpubVersion {
    /// Returns the `version` attribute of the package document.
    #[must_use]
    pub fn package_version(self) -> &'static str {
        match self {
            Self::V2 => "2.0",
            Self::V3 => "3.0",
        }
    }
}

/// Network behavior shared by every resource fetch in a build.
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    /// Maximum number of fetches in flight per wave (>= 1).
    pub batch_size: usize,
    /// Upper bound on a single fetch attempt.
    pub fetch_timeout: Duration,
    /// Attempt budget and backoff.
    pub retry: RetryPolicy,
    /// Downgrade a resource's final failure to an empty payload.
    pub ignore_failed_downloads: bool,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryPolicy::immediate(DEFAULT_RETRY_TIMES),
            ignore_failed_downloads: false,
        }
    }
}

/// Validated package-level settings. Immutable once built.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: String,
    pub description: String,
    pub lang: String,
    pub date: String,
    pub toc_title: String,
    pub toc_in_toc: bool,
    pub number_chapters_in_toc: bool,
    pub prepend_chapter_titles: bool,
    /// Replacement for the built-in stylesheet.
    pub css: Option<String>,
    pub cover: Option<CoverAsset>,
    pub fonts: Vec<FontAsset>,
    pub version: EpubVersion,
    pub network: NetworkPolicy,
    pub log_policy: LogPolicy,
}

/// Canonical chapter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedChapter {
    /// Dense, zero-based position in caller order.
    pub id: usize,
    pub title: String,
    pub authors: Vec<String>,
    /// Package-relative filename (under `OEBPS/`).
    pub filename: String,
    /// Body markup; sanitized in place before rendering.
    pub body: String,
    pub before_toc: bool,
    pub exclude_from_toc: bool,
    /// Package-relative path of this chapter's own stylesheet.
    pub stylesheet: Option<String>,
    /// Stylesheet text backing [`Self::stylesheet`].
    pub css: Option<String>,
}

impl NormalizedChapter {
    /// Archive path of the rendered chapter document.
    #[must_use]
    pub fn archive_path(&self) -> String {
        format!("OEBPS/{}", self.filename)
    }

    /// Manifest item id.
    #[must_use]
    pub fn manifest_id(&self) -> String {
        format!("content_{}", self.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_original_field_names() {
        let json = r#"{
            "title": "Alice",
            "author": ["Lewis Carroll"],
            "tocTitle": "Contents",
            "tocInTOC": false,
            "numberChaptersInTOC": false,
            "fetchTimeout": 5000,
            "retryTimes": 2,
            "batchSize": -1,
            "ignoreFailedDownloads": true,
            "verbose": false,
            "fonts": [{"filename": "a.ttf", "url": "http://x/a.ttf"}]
        }"#;
        let options: EpubOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.title, "Alice");
        assert_eq!(
            options.author,
            Some(Names::Many(vec!["Lewis Carroll".to_string()]))
        );
        assert_eq!(options.toc_title.as_deref(), Some("Contents"));
        assert_eq!(options.toc_in_toc, Some(false));
        assert_eq!(options.number_chapters_in_toc, Some(false));
        assert_eq!(options.fetch_timeout, Some(5000));
        assert_eq!(options.retry_times, Some(2));
        assert_eq!(options.batch_size, Some(-1));
        assert_eq!(options.ignore_failed_downloads, Some(true));
        assert!(matches!(options.verbose, LogPolicy::Silent));
        assert_eq!(options.fonts.len(), 1);
    }

    #[test]
    fn test_options_accept_authors_alias_and_single_name() {
        let options: EpubOptions = serde_json::from_str(r#"{"title":"T","authors":"A"}"#).unwrap();
        assert_eq!(options.author, Some(Names::One("A".to_string())));
    }

    #[test]
    fn test_names_into_vec_drops_blank_entries() {
        let names = Names::Many(vec![" A ".to_string(), "  ".to_string(), "B".to_string()]);
        assert_eq!(names.into_vec(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_raw_chapter_deserialize_flags() {
        let chapter: RawChapter = serde_json::from_str(
            r#"{"title":"Preface","content":"<p>x</p>","beforeToc":true,"excludeFromToc":true}"#,
        )
        .unwrap();
        assert!(chapter.before_toc);
        assert!(chapter.exclude_from_toc);
        assert_eq!(chapter.content.as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn test_network_policy_defaults() {
        let policy = NetworkPolicy::default();
        assert_eq!(policy.batch_size, 100);
        assert_eq!(policy.fetch_timeout, Duration::from_secs(20));
        assert_eq!(policy.retry.max_attempts(), 3);
        assert!(!policy.ignore_failed_downloads);
    }
}
