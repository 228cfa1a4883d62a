//! Rendering of the package skeleton: stylesheet, chapter documents,
//! container, package document, navigation, and cover page.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::OutputFile;
use crate::assets::SealedImages;
use crate::config::{BuildConfig, EpubVersion, NormalizedChapter};
use crate::template::{
    CHAPTER_XHTML, CONTAINER_XML, CONTENT_OPF, COVER_XHTML, TEMPLATE_CSS, TOC_NCX, TOC_XHTML,
    TemplateError, TemplateRenderer,
};

/// Manifest id and href of the navigation page.
const TOC_ID: &str = "toc";
const TOC_HREF: &str = "toc.xhtml";

/// Everything rendered in one build, in archive order.
#[instrument(skip_all, fields(chapters = chapters.len(), images = images.as_slice().len()))]
pub(crate) fn render_package(
    config: &BuildConfig,
    chapters: &[NormalizedChapter],
    images: &SealedImages,
    book_id: &str,
    renderer: &TemplateRenderer,
) -> Result<Vec<OutputFile>, TemplateError> {
    let mut files = Vec::with_capacity(chapters.len() * 2 + 6);

    let stylesheet = match &config.css {
        Some(css) => css.as_str(),
        None => renderer.asset(TEMPLATE_CSS)?,
    };
    files.push(OutputFile::new("OEBPS/style.css", stylesheet));

    for chapter in chapters {
        let document = renderer.render(CHAPTER_XHTML, &chapter_data(config, chapter))?;
        files.push(OutputFile::new(chapter.archive_path(), document));
        if let (Some(href), Some(css)) = (&chapter.stylesheet, &chapter.css) {
            files.push(OutputFile::new(format!("OEBPS/{href}"), css.as_str()));
        }
    }

    files.push(OutputFile::new(
        "META-INF/container.xml",
        renderer.asset(CONTAINER_XML)?,
    ));

    let data = package_data(config, chapters, images, book_id);
    files.push(OutputFile::new(
        "OEBPS/content.opf",
        renderer.render(CONTENT_OPF, &data)?,
    ));
    files.push(OutputFile::new(
        "OEBPS/toc.ncx",
        renderer.render(TOC_NCX, &data)?,
    ));
    files.push(OutputFile::new(
        "OEBPS/toc.xhtml",
        renderer.render(TOC_XHTML, &data)?,
    ));
    if config.cover.is_some() {
        files.push(OutputFile::new(
            "OEBPS/cover.xhtml",
            renderer.render(COVER_XHTML, &data)?,
        ));
    }

    debug!(files = files.len(), "package templates rendered");
    Ok(files)
}

fn chapter_data(config: &BuildConfig, chapter: &NormalizedChapter) -> Value {
    json!({
        "epub3": config.version == EpubVersion::V3,
        "lang": config.lang,
        "title": chapter.title,
        "authors": chapter.authors.join(", "),
        "prepend_chapter_titles": config.prepend_chapter_titles,
        "stylesheet": chapter.stylesheet,
        "body": chapter.body,
    })
}

/// Record shared by the package document, both navigation files, and the
/// cover page.
fn package_data(
    config: &BuildConfig,
    chapters: &[NormalizedChapter],
    images: &SealedImages,
    book_id: &str,
) -> Value {
    let reading_order = reading_order(chapters);

    let mut spine = Vec::with_capacity(chapters.len() + 2);
    if config.cover.is_some() {
        spine.push("cover".to_string());
    }
    for entry in &reading_order {
        match entry {
            Some(chapter) => spine.push(chapter.manifest_id()),
            None => spine.push(TOC_ID.to_string()),
        }
    }

    let first_chapter = chapters
        .iter()
        .find(|chapter| !chapter.before_toc)
        .or_else(|| chapters.first())
        .map(|chapter| chapter.filename.clone());

    json!({
        "epub3": config.version == EpubVersion::V3,
        "package_version": config.version.package_version(),
        "id": book_id,
        "title": config.title,
        "description": config.description,
        "publisher": config.publisher,
        "authors": config.authors,
        "author": config.authors.join(", "),
        "date": config.date,
        "modified": Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "lang": config.lang,
        "toc_title": config.toc_title,
        "cover": config.cover.as_ref().map(|cover| json!({
            "href": cover.href(),
            "media_type": cover.media_type,
        })),
        "images": images.as_slice().iter().map(|image| json!({
            "id": image.id,
            "href": image.href(),
            "media_type": image.media_type,
        })).collect::<Vec<_>>(),
        "chapters": chapters.iter().map(|chapter| json!({
            "manifest_id": chapter.manifest_id(),
            "filename": chapter.filename,
            "stylesheet": chapter.stylesheet,
        })).collect::<Vec<_>>(),
        "fonts": config.fonts.iter().map(|font| json!({
            "href": format!("fonts/{}", font.filename),
            "media_type": font.media_type,
        })).collect::<Vec<_>>(),
        "spine": spine,
        "nav_points": nav_points(config, &reading_order),
        "first_chapter": first_chapter,
    })
}

/// Spine order after the cover: `beforeToc` chapters, the navigation page
/// (`None`), then every other chapter, each group in id order.
fn reading_order(chapters: &[NormalizedChapter]) -> Vec<Option<&NormalizedChapter>> {
    chapters
        .iter()
        .filter(|chapter| chapter.before_toc)
        .map(Some)
        .chain(std::iter::once(None))
        .chain(
            chapters
                .iter()
                .filter(|chapter| !chapter.before_toc)
                .map(Some),
        )
        .collect()
}

fn nav_points(config: &BuildConfig, reading_order: &[Option<&NormalizedChapter>]) -> Vec<Value> {
    let mut points = Vec::new();
    let mut number = 0usize;

    for entry in reading_order {
        let point = match entry {
            None if config.toc_in_toc => json!({
                "id": TOC_ID,
                "label": config.toc_title,
                "href": TOC_HREF,
                "authors": "",
            }),
            None => continue,
            Some(chapter) if chapter.exclude_from_toc => continue,
            Some(chapter) => {
                number += 1;
                let label = if config.number_chapters_in_toc {
                    format!("{number}. {}", chapter.title)
                } else {
                    chapter.title.clone()
                };
                json!({
                    "id": chapter.manifest_id(),
                    "label": label,
                    "href": chapter.filename,
                    "authors": chapter.authors.join(", "),
                })
            }
        };
        points.push(point);
    }

    for (index, point) in points.iter_mut().enumerate() {
        point["play_order"] = json!(index + 1);
    }
    points
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assets::{CoverAsset, ImageTable};
    use crate::config::{EpubOptions, RawChapter};
    use crate::normalize::{normalize_chapters, normalize_options};

    fn setup(
        options: EpubOptions,
        raw: &[RawChapter],
    ) -> (BuildConfig, Vec<NormalizedChapter>, TemplateRenderer) {
        (
            normalize_options(options).unwrap(),
            normalize_chapters(raw).unwrap(),
            TemplateRenderer::builtin().unwrap(),
        )
    }

    fn text<'a>(files: &'a [OutputFile], path: &str) -> &'a str {
        let file = files.iter().find(|file| file.path == path).unwrap();
        std::str::from_utf8(&file.data).unwrap()
    }

    #[test]
    fn test_renders_expected_file_set() {
        let (config, chapters, renderer) = setup(
            EpubOptions::titled("T"),
            &[RawChapter::new("Ch1", "<p>Hi</p>")],
        );
        let files = render_package(
            &config,
            &chapters,
            &SealedImages::default(),
            "urn:uuid:1",
            &renderer,
        )
        .unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "OEBPS/style.css",
                "OEBPS/0_ch1.xhtml",
                "META-INF/container.xml",
                "OEBPS/content.opf",
                "OEBPS/toc.ncx",
                "OEBPS/toc.xhtml",
            ]
        );
        let chapter = text(&files, "OEBPS/0_ch1.xhtml");
        assert!(chapter.contains("<h1>Ch1</h1>"));
        assert!(chapter.contains("<p>Hi</p>"));
        let opf = text(&files, "OEBPS/content.opf");
        assert!(opf.contains("urn:uuid:1"));
        assert!(opf.contains("version=\"3.0\""));
        assert!(opf.contains("properties=\"nav\""));
    }

    #[test]
    fn test_manifest_lists_images_fonts_and_cover() {
        let mut options = EpubOptions::titled("T");
        options.cover = Some("http://x/c.png".to_string());
        options.fonts = vec![crate::config::FontOption {
            filename: "f.woff".to_string(),
            url: "http://x/f.woff".to_string(),
        }];
        let (config, chapters, renderer) = setup(options, &[RawChapter::new("A", "x")]);
        let mut table = ImageTable::new();
        table.register("http://x/a.gif");
        let files =
            render_package(&config, &chapters, &table.seal(), "urn:uuid:1", &renderer).unwrap();

        let opf = text(&files, "OEBPS/content.opf");
        assert!(opf.contains(
            "<item id=\"image_0\" href=\"images/image_0.gif\" media-type=\"image/gif\"/>"
        ));
        assert!(opf.contains("href=\"fonts/f.woff\" media-type=\"font/woff\""));
        assert!(opf.contains("href=\"cover.png\" media-type=\"image/png\" properties=\"cover-image\""));
        assert!(opf.contains("<itemref idref=\"cover\"/>"));
        assert_eq!(
            CoverAsset::from_url("http://x/c.png").href(),
            "cover.png"
        );
        assert!(text(&files, "OEBPS/cover.xhtml").contains("src=\"cover.png\""));
    }

    #[test]
    fn test_spine_puts_before_toc_chapters_first() {
        let mut raw = vec![
            RawChapter::new("Main", "x"),
            RawChapter::new("Preface", "x"),
        ];
        raw[1].before_toc = true;
        let (config, chapters, _) = setup(EpubOptions::titled("T"), &raw);
        let data = package_data(&config, &chapters, &SealedImages::default(), "id");
        assert_eq!(data["spine"], json!(["content_1", "toc", "content_0"]));
    }

    #[test]
    fn test_nav_points_numbering_and_exclusion() {
        let mut raw = vec![
            RawChapter::new("One", "x"),
            RawChapter::new("Hidden", "x"),
            RawChapter::new("Two", "x"),
        ];
        raw[1].exclude_from_toc = true;
        let (config, chapters, _) = setup(EpubOptions::titled("T"), &raw);
        let data = package_data(&config, &chapters, &SealedImages::default(), "id");
        let labels: Vec<_> = data["nav_points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["label"].as_str().unwrap().to_string(), p["play_order"].as_u64().unwrap()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Table of Contents".to_string(), 1),
                ("1. One".to_string(), 2),
                ("2. Two".to_string(), 3),
            ]
        );
        assert_eq!(data["spine"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_toc_page_can_be_left_out_of_navigation() {
        let mut options = EpubOptions::titled("T");
        options.toc_in_toc = Some(false);
        options.number_chapters_in_toc = Some(false);
        let (config, chapters, _) = setup(options, &[RawChapter::new("One", "x")]);
        let data = package_data(&config, &chapters, &SealedImages::default(), "id");
        assert_eq!(data["nav_points"].as_array().unwrap().len(), 1);
        assert_eq!(data["nav_points"][0]["label"], json!("One"));
    }

    #[test]
    fn test_epub2_package_and_custom_css() {
        let mut options = EpubOptions::titled("T");
        options.version = Some(2);
        options.css = Some("body { color: black; }".to_string());
        let mut raw = vec![RawChapter::new("A", "x")];
        raw[0].css = Some("p { margin: 0; }".to_string());
        let (config, chapters, renderer) = setup(options, &raw);
        let files = render_package(
            &config,
            &chapters,
            &SealedImages::default(),
            "id",
            &renderer,
        )
        .unwrap();
        assert_eq!(text(&files, "OEBPS/style.css"), "body { color: black; }");
        assert_eq!(text(&files, "OEBPS/css/0_a.css"), "p { margin: 0; }");
        assert!(text(&files, "OEBPS/0_a.xhtml").contains("href=\"css/0_a.css\""));
        let opf = text(&files, "OEBPS/content.opf");
        assert!(opf.contains("version=\"2.0\""));
        assert!(opf.contains("opf:role=\"aut\""));
        assert!(!opf.contains("properties=\"nav\""));
    }
}
