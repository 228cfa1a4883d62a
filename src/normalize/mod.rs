//! Input normalization.
//!
//! Turns caller options and chapters into the strict forms the rest of the
//! pipeline relies on: defaults applied, numeric knobs range-checked, chapter
//! ids assigned densely from zero and filenames derived from them. Nothing
//! here performs I/O, and normalizing the same chapters twice yields the
//! same ids and filenames.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::assets::media_type::{self, FALLBACK_MEDIA_TYPE};
use crate::assets::{CoverAsset, FontAsset};
use crate::config::{
    BuildConfig, DEFAULT_ANONYMOUS, DEFAULT_BATCH_SIZE, DEFAULT_FETCH_TIMEOUT, DEFAULT_LANG,
    DEFAULT_RETRY_TIMES, DEFAULT_TOC_TITLE, EpubOptions, EpubVersion, FontOption, NetworkPolicy,
    NormalizedChapter, RawChapter,
};
use crate::fetch::RetryPolicy;

/// Filenames the package itself writes under `OEBPS/`.
const RESERVED_FILENAMES: &[&str] = &["toc.xhtml", "cover.xhtml"];

/// Longest title slug used in generated chapter filenames.
const MAX_SLUG_LEN: usize = 40;

/// BCP 47-ish language tag: primary subtag plus optional subtags.
#[allow(clippy::expect_used)]
static LANG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{1,8})*$").expect("language regex is valid") // Static pattern, safe to panic
});

/// Rejected build input, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    Missing { field: String },

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("at least one chapter is required")]
    EmptyChapters,
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field path the error refers to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => Some(field),
            Self::EmptyChapters => None,
        }
    }
}

/// Validates options and fills in documented defaults.
///
/// # Errors
///
/// Returns [`ValidationError`] for a blank title, a malformed language tag,
/// out-of-range numeric settings, an unsupported version, or bad font entries.
#[instrument(skip(options), fields(title = %options.title))]
pub fn normalize_options(options: EpubOptions) -> Result<BuildConfig, ValidationError> {
    let title = options.title.trim().to_string();
    if title.is_empty() {
        return Err(ValidationError::missing("title"));
    }

    let network = normalize_network(&options)?;
    let fonts = normalize_fonts(&options.fonts)?;

    let mut authors = options.author.map(|names| names.into_vec()).unwrap_or_default();
    if authors.is_empty() {
        authors.push(DEFAULT_ANONYMOUS.to_string());
    }

    let lang = non_blank(options.lang).unwrap_or_else(|| DEFAULT_LANG.to_string());
    if !LANG_PATTERN.is_match(&lang) {
        return Err(ValidationError::invalid(
            "lang",
            format!("`{lang}` is not a language tag"),
        ));
    }

    let version = match options.version {
        None | Some(3) => EpubVersion::V3,
        Some(2) => EpubVersion::V2,
        Some(other) => {
            return Err(ValidationError::invalid(
                "version",
                format!("expected 2 or 3, got {other}"),
            ));
        }
    };

    let cover = non_blank(options.cover).map(|url| CoverAsset::from_url(&url));

    let config = BuildConfig {
        publisher: non_blank(options.publisher).unwrap_or_else(|| DEFAULT_ANONYMOUS.to_string()),
        description: non_blank(options.description).unwrap_or_else(|| title.clone()),
        date: non_blank(options.date)
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        toc_title: non_blank(options.toc_title).unwrap_or_else(|| DEFAULT_TOC_TITLE.to_string()),
        toc_in_toc: options.toc_in_toc.unwrap_or(true),
        number_chapters_in_toc: options.number_chapters_in_toc.unwrap_or(true),
        prepend_chapter_titles: options.prepend_chapter_titles.unwrap_or(true),
        css: options.css,
        title,
        authors,
        lang,
        cover,
        fonts,
        version,
        network,
        log_policy: options.verbose,
    };

    debug!(
        version = config.version.package_version(),
        fonts = config.fonts.len(),
        cover = config.cover.is_some(),
        batch_size = config.network.batch_size,
        "options normalized"
    );
    Ok(config)
}

fn normalize_network(options: &EpubOptions) -> Result<NetworkPolicy, ValidationError> {
    let batch_size = match options.batch_size {
        None => DEFAULT_BATCH_SIZE,
        Some(value) if value >= 1 => usize::try_from(value)
            .map_err(|_| ValidationError::invalid("batchSize", "value is too large"))?,
        Some(value) => {
            return Err(ValidationError::invalid(
                "batchSize",
                format!("must be at least 1, got {value}"),
            ));
        }
    };

    let retry_times = match options.retry_times {
        None => DEFAULT_RETRY_TIMES,
        Some(value) if value >= 1 => u32::try_from(value)
            .map_err(|_| ValidationError::invalid("retryTimes", "value is too large"))?,
        Some(value) => {
            return Err(ValidationError::invalid(
                "retryTimes",
                format!("must be at least 1, got {value}"),
            ));
        }
    };

    let fetch_timeout = match options.fetch_timeout {
        None => DEFAULT_FETCH_TIMEOUT,
        Some(value) if value > 0 => Duration::from_millis(value.unsigned_abs()),
        Some(value) => {
            return Err(ValidationError::invalid(
                "fetchTimeout",
                format!("must be positive, got {value}"),
            ));
        }
    };

    let retry = match options.retry_delay {
        None | Some(0) => RetryPolicy::immediate(retry_times),
        Some(value) if value > 0 => {
            RetryPolicy::with_base_delay(retry_times, Duration::from_millis(value.unsigned_abs()))
        }
        Some(value) => {
            return Err(ValidationError::invalid(
                "retryDelay",
                format!("must not be negative, got {value}"),
            ));
        }
    };

    Ok(NetworkPolicy {
        batch_size,
        fetch_timeout,
        retry,
        ignore_failed_downloads: options.ignore_failed_downloads.unwrap_or(false),
    })
}

fn normalize_fonts(fonts: &[FontOption]) -> Result<Vec<FontAsset>, ValidationError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(fonts.len());

    for (index, font) in fonts.iter().enumerate() {
        let filename = font.filename.trim();
        let url = font.url.trim();
        if filename.is_empty() {
            return Err(ValidationError::missing(format!("fonts[{index}].filename")));
        }
        if url.is_empty() {
            return Err(ValidationError::missing(format!("fonts[{index}].url")));
        }
        if !is_plain_filename(filename) {
            return Err(ValidationError::invalid(
                format!("fonts[{index}].filename"),
                format!("`{filename}` must be a plain file name"),
            ));
        }
        if !seen.insert(filename.to_string()) {
            return Err(ValidationError::invalid(
                format!("fonts[{index}].filename"),
                format!("`{filename}` is used by another font"),
            ));
        }

        let media_type = media_type::infer_from_filename(filename)
            .map_or(FALLBACK_MEDIA_TYPE, |(_, media_type)| media_type);
        out.push(FontAsset {
            url: url.to_string(),
            filename: filename.to_string(),
            media_type: media_type.to_string(),
        });
    }
    Ok(out)
}

/// Assigns ids and filenames to chapters, preserving caller order.
///
/// `beforeToc` chapters are tagged, not reordered.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyChapters`] for an empty list, and
/// [`ValidationError`] naming `chapters[i].<field>` for missing content or
/// an unusable, reserved, or duplicate filename.
#[instrument(skip(chapters), fields(count = chapters.len()))]
pub fn normalize_chapters(
    chapters: &[RawChapter],
) -> Result<Vec<NormalizedChapter>, ValidationError> {
    if chapters.is_empty() {
        return Err(ValidationError::EmptyChapters);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(chapters.len());

    for (id, chapter) in chapters.iter().enumerate() {
        let Some(body) = chapter.content.clone() else {
            return Err(ValidationError::missing(format!("chapters[{id}].content")));
        };
        let title = non_blank(chapter.title.clone()).unwrap_or_else(|| format!("Chapter {}", id + 1));
        let filename = chapter_filename(id, &title, chapter.filename.as_deref())?;

        if RESERVED_FILENAMES.contains(&filename.as_str()) {
            return Err(ValidationError::invalid(
                format!("chapters[{id}].filename"),
                format!("`{filename}` is reserved for the package"),
            ));
        }
        if !seen.insert(filename.clone()) {
            return Err(ValidationError::invalid(
                format!("chapters[{id}].filename"),
                format!("`{filename}` is used by another chapter"),
            ));
        }

        let css = non_blank(chapter.css.clone());
        let stylesheet = css
            .as_ref()
            .map(|_| format!("css/{}.css", filename.trim_end_matches(".xhtml")));

        out.push(NormalizedChapter {
            id,
            title,
            authors: chapter
                .author
                .clone()
                .map(|names| names.into_vec())
                .unwrap_or_default(),
            filename,
            body,
            before_toc: chapter.before_toc,
            exclude_from_toc: chapter.exclude_from_toc,
            stylesheet,
            css,
        });
    }

    debug!(
        before_toc = out.iter().filter(|c| c.before_toc).count(),
        "chapters normalized"
    );
    Ok(out)
}

fn chapter_filename(
    id: usize,
    title: &str,
    requested: Option<&str>,
) -> Result<String, ValidationError> {
    let Some(requested) = requested.map(str::trim).filter(|name| !name.is_empty()) else {
        let slug = slugify(title);
        return Ok(if slug.is_empty() {
            format!("{id}.xhtml")
        } else {
            format!("{id}_{slug}.xhtml")
        });
    };

    if !is_plain_filename(requested) {
        return Err(ValidationError::invalid(
            format!("chapters[{id}].filename"),
            format!("`{requested}` must be a plain file name"),
        ));
    }
    Ok(if requested.ends_with(".xhtml") {
        requested.to_string()
    } else {
        format!("{requested}.xhtml")
    })
}

/// Lowercase ASCII slug: runs of other characters collapse to one `-`.
fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

fn is_plain_filename(name: &str) -> bool {
    !name.contains(['/', '\\']) && name != "." && name != ".."
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
