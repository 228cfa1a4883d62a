//! Embedded resources: images discovered in chapters, fonts, and the cover.
//!
//! The [`ImageTable`] is the build's single asset table. It is owned by the
//! assembler, passed by `&mut` into each sanitizer call, and sealed into
//! [`SealedImages`] once sanitization ends so no entry can be added while
//! downloads are in flight.

pub mod media_type;

use std::collections::HashMap;
use std::fmt;

/// What a fetched resource is used for. Appears in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Font,
    Image,
    Cover,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Font => "font",
            Self::Image => "image",
            Self::Cover => "cover",
        };
        write!(f, "{label}")
    }
}

/// A deduplicated image referenced from chapter markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Source URL; the dedup key.
    pub url: String,
    /// Generated id, unique within one build.
    pub id: String,
    pub extension: String,
    pub media_type: String,
}

impl ImageAsset {
    /// Path relative to the package document (`OEBPS/`).
    #[must_use]
    pub fn href(&self) -> String {
        format!("images/{}.{}", self.id, self.extension)
    }

    /// Path inside the archive.
    #[must_use]
    pub fn archive_path(&self) -> String {
        format!("OEBPS/{}", self.href())
    }
}

/// Open asset table, accepting new images during sanitization.
#[derive(Debug, Default)]
pub struct ImageTable {
    assets: Vec<ImageAsset>,
    by_url: HashMap<String, usize>,
}

impl ImageTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the asset for `url`, creating it on first sight.
    ///
    /// Ids are assigned in discovery order (`image_0`, `image_1`, ...).
    pub fn register(&mut self, url: &str) -> &ImageAsset {
        let index = match self.by_url.get(url) {
            Some(&index) => index,
            None => {
                let (extension, media_type) = media_type::infer_image_from_url(url);
                let index = self.assets.len();
                self.assets.push(ImageAsset {
                    url: url.to_string(),
                    id: format!("image_{index}"),
                    extension: extension.to_string(),
                    media_type: media_type.to_string(),
                });
                self.by_url.insert(url.to_string(), index);
                index
            }
        };
        &self.assets[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Closes the table to new entries.
    #[must_use]
    pub fn seal(self) -> SealedImages {
        SealedImages {
            assets: self.assets,
        }
    }
}

/// Closed asset table, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct SealedImages {
    assets: Vec<ImageAsset>,
}

impl SealedImages {
    #[must_use]
    pub fn as_slice(&self) -> &[ImageAsset] {
        &self.assets
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// A font declared in the build options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontAsset {
    pub url: String,
    /// Target filename under `fonts/`.
    pub filename: String,
    pub media_type: String,
}

impl FontAsset {
    #[must_use]
    pub fn archive_path(&self) -> String {
        format!("OEBPS/fonts/{}", self.filename)
    }
}

/// The configured cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverAsset {
    pub url: String,
    pub extension: String,
    pub media_type: String,
}

impl CoverAsset {
    /// Builds the cover descriptor, inferring its type from the URL.
    ///
    /// Unknown types fall back to JPEG.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let (extension, media_type) = media_type::infer_image_from_url(url);
        Self {
            url: url.to_string(),
            extension: extension.to_string(),
            media_type: media_type.to_string(),
        }
    }

    #[must_use]
    pub fn href(&self) -> String {
        format!("cover.{}", self.extension)
    }

    #[must_use]
    pub fn archive_path(&self) -> String {
        format!("OEBPS/{}", self.href())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_same_url_returns_same_asset() {
        let mut table = ImageTable::new();
        let first = table.register("http://x/a.png").clone();
        let second = table.register("http://x/a.png").clone();
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_register_assigns_ids_in_discovery_order() {
        let mut table = ImageTable::new();
        let a = table.register("http://x/a.png").id.clone();
        let b = table.register("http://x/b.gif").id.clone();
        table.register("http://x/a.png");
        assert_eq!(a, "image_0");
        assert_eq!(b, "image_1");

        let sealed = table.seal();
        let urls: Vec<_> = sealed.as_slice().iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["http://x/a.png", "http://x/b.gif"]);
    }

    #[test]
    fn test_register_infers_extension_and_media_type() {
        let mut table = ImageTable::new();
        let asset = table.register("https://cdn.example.com/pic.jpeg?size=large");
        assert_eq!(asset.extension, "jpg");
        assert_eq!(asset.media_type, "image/jpeg");
        assert_eq!(asset.href(), "images/image_0.jpg");
        assert_eq!(asset.archive_path(), "OEBPS/images/image_0.jpg");
    }

    #[test]
    fn test_register_unknown_type_falls_back() {
        let mut table = ImageTable::new();
        let asset = table.register("https://example.com/render?id=7");
        assert_eq!(asset.extension, "jpg");
        assert_eq!(asset.media_type, "image/jpeg");
        assert_eq!(asset.href(), "images/image_0.jpg");
    }

    #[test]
    fn test_cover_from_url_defaults_to_jpeg() {
        let cover = CoverAsset::from_url("https://example.com/cover");
        assert_eq!(cover.extension, "jpg");
        assert_eq!(cover.media_type, "image/jpeg");

        let cover = CoverAsset::from_url("https://example.com/cover.png");
        assert_eq!(cover.href(), "cover.png");
        assert_eq!(cover.archive_path(), "OEBPS/cover.png");
    }

    #[test]
    fn test_resource_kind_display() {
        assert_eq!(ResourceKind::Font.to_string(), "font");
        assert_eq!(ResourceKind::Image.to_string(), "image");
        assert_eq!(ResourceKind::Cover.to_string(), "cover");
    }
}
