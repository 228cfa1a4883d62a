//! Media type and extension inference for embedded resources.

use url::Url;

/// Media type used when a resource's type cannot be inferred.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Extension and media type assumed for images and covers of unknown type.
pub const IMAGE_FALLBACK: (&str, &str) = ("jpg", "image/jpeg");

/// Canonical extension and media type for a known file extension.
///
/// Matching is case-insensitive; `jpeg`/`jpe` collapse to `jpg`.
#[must_use]
pub fn lookup_extension(extension: &str) -> Option<(&'static str, &'static str)> {
    let found = match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => ("jpg", "image/jpeg"),
        "png" => ("png", "image/png"),
        "gif" => ("gif", "image/gif"),
        "webp" => ("webp", "image/webp"),
        "svg" => ("svg", "image/svg+xml"),
        "bmp" => ("bmp", "image/bmp"),
        "avif" => ("avif", "image/avif"),
        "ttf" => ("ttf", "font/ttf"),
        "otf" => ("otf", "font/otf"),
        "woff" => ("woff", "font/woff"),
        "woff2" => ("woff2", "font/woff2"),
        _ => return None,
    };
    Some(found)
}

/// Extension of the last path segment of `url`, ignoring query and fragment.
///
/// Falls back to plain string handling when `url` does not parse.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let last_segment = path.rsplit('/').next()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index + 1..];
    if ext.is_empty() || ext.len() > 12 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Infers `(extension, media type)` from a resource URL.
#[must_use]
pub fn infer_from_url(url: &str) -> Option<(&'static str, &'static str)> {
    extension_from_url(url).and_then(|ext| lookup_extension(&ext))
}

/// Like [`infer_from_url`], but only image types count; anything else is
/// [`IMAGE_FALLBACK`].
#[must_use]
pub fn infer_image_from_url(url: &str) -> (&'static str, &'static str) {
    infer_from_url(url)
        .filter(|(_, media_type)| media_type.starts_with("image/"))
        .unwrap_or(IMAGE_FALLBACK)
}

/// Infers `(extension, media type)` from a filename such as `serif.woff2`.
#[must_use]
pub fn infer_from_filename(filename: &str) -> Option<(&'static str, &'static str)> {
    let (_, ext) = filename.rsplit_once('.')?;
    lookup_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_url_png() {
        assert_eq!(
            infer_from_url("http://x/y.png"),
            Some(("png", "image/png"))
        );
    }

    #[test]
    fn test_infer_from_url_strips_query() {
        assert_eq!(
            infer_from_url("https://cdn.example.com/a/photo.JPEG?w=200#top"),
            Some(("jpg", "image/jpeg"))
        );
    }

    #[test]
    fn test_infer_from_url_unknown_extension() {
        assert_eq!(infer_from_url("https://example.com/image.php"), None);
        assert_eq!(infer_from_url("https://example.com/image"), None);
    }

    #[test]
    fn test_extension_from_url_unparseable_input() {
        assert_eq!(extension_from_url("images/a.gif?x=1"), Some("gif".to_string()));
    }

    #[test]
    fn test_infer_from_filename_fonts() {
        assert_eq!(infer_from_filename("Serif.woff2"), Some(("woff2", "font/woff2")));
        assert_eq!(infer_from_filename("mono.ttf"), Some(("ttf", "font/ttf")));
        assert_eq!(infer_from_filename("noext"), None);
    }

    #[test]
    fn test_infer_image_from_url_falls_back_to_jpeg() {
        assert_eq!(infer_image_from_url("http://x/y.gif"), ("gif", "image/gif"));
        assert_eq!(infer_image_from_url("http://x/render?id=7"), IMAGE_FALLBACK);
        assert_eq!(infer_image_from_url("http://x/font.ttf"), IMAGE_FALLBACK);
    }
}
