//! Chapter sanitization.
//!
//! Each chapter body is parsed with html5ever (which never rejects input),
//! stripped of attributes outside [`ALLOWED_ATTRIBUTES`], and scanned for
//! `<img>` elements. Every usable image source is registered in the shared
//! [`ImageTable`] and rewritten to its local asset path; the body content is
//! then serialized back as XHTML without the document wrapper.
//!
//! Only absolute `http`/`https` sources are fetched. Embedded `data:` images
//! and relative paths are removed with a warning.

mod dom;
mod serialize;

use html5ever::{Attribute, LocalName, QualName, ns};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::assets::ImageTable;
use crate::config::NormalizedChapter;
use crate::logging::Logger;
use dom::{Handle, NodeData};

/// Alternative text given to images that carry none.
pub const PLACEHOLDER_ALT: &str = "image-placeholder";

/// Attributes kept on chapter elements; everything else is removed.
pub const ALLOWED_ATTRIBUTES: &[&str] = &[
    "about",
    "accesskey",
    "alt",
    "aria-activedescendant",
    "aria-atomic",
    "aria-autocomplete",
    "aria-busy",
    "aria-checked",
    "aria-controls",
    "aria-describedby",
    "aria-disabled",
    "aria-dropeffect",
    "aria-expanded",
    "aria-flowto",
    "aria-grabbed",
    "aria-haspopup",
    "aria-hidden",
    "aria-invalid",
    "aria-label",
    "aria-labelledby",
    "aria-level",
    "aria-live",
    "aria-multiline",
    "aria-multiselectable",
    "aria-orientation",
    "aria-owns",
    "aria-posinset",
    "aria-pressed",
    "aria-readonly",
    "aria-relevant",
    "aria-required",
    "aria-selected",
    "aria-setsize",
    "aria-sort",
    "aria-valuemax",
    "aria-valuemin",
    "aria-valuenow",
    "aria-valuetext",
    "class",
    "colspan",
    "content",
    "contenteditable",
    "contextmenu",
    "datatype",
    "dir",
    "draggable",
    "dropzone",
    "epub:prefix",
    "epub:type",
    "height",
    "hidden",
    "href",
    "hreflang",
    "id",
    "inlist",
    "itemid",
    "itemprop",
    "itemref",
    "itemscope",
    "itemtype",
    "lang",
    "media",
    "prefix",
    "property",
    "rel",
    "resource",
    "rev",
    "role",
    "rowspan",
    "spellcheck",
    "src",
    "style",
    "tabindex",
    "target",
    "title",
    "type",
    "typeof",
    "vocab",
    "width",
    "xml:base",
    "xml:lang",
    "xml:space",
];

/// Chapter markup that could not be turned into a body tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chapter {chapter} markup is unusable: {reason}")]
pub struct MarkupError {
    /// Zero-based chapter index.
    pub chapter: usize,
    pub reason: String,
}

/// Sanitizes every chapter body in place, in id order.
///
/// # Errors
///
/// Returns the first chapter's [`MarkupError`]; later chapters are left
/// untouched.
pub fn sanitize_chapters(
    chapters: &mut [NormalizedChapter],
    images: &mut ImageTable,
    logger: &Logger,
) -> Result<(), MarkupError> {
    for chapter in chapters.iter_mut() {
        chapter.body = sanitize_chapter(chapter.id, &chapter.body, images, logger)?;
    }
    Ok(())
}

/// Sanitizes one chapter body and registers its images.
///
/// # Errors
///
/// Returns [`MarkupError`] when the parsed document has no body, which
/// happens for frameset documents.
#[instrument(skip(markup, images, logger), fields(len = markup.len()))]
pub fn sanitize_chapter(
    index: usize,
    markup: &str,
    images: &mut ImageTable,
    logger: &Logger,
) -> Result<String, MarkupError> {
    let document = dom::parse_html(markup);
    let body = dom::find_element(&document, &|node| node.is_html_element("body")).ok_or_else(
        || MarkupError {
            chapter: index,
            reason: "document has no body".to_string(),
        },
    )?;

    let elements = dom::descendant_elements(&body);
    for element in &elements {
        strip_disallowed_attributes(index, element, logger);
    }

    let mut removed = 0usize;
    for element in elements.iter().filter(|node| node.is_html_element("img")) {
        if !rewrite_image(index, element, images, logger) {
            dom::detach(element);
            removed += 1;
        }
    }

    debug!(
        elements = elements.len(),
        images = images.len(),
        removed,
        "chapter sanitized"
    );
    Ok(serialize::serialize_children(&body))
}

fn strip_disallowed_attributes(index: usize, element: &Handle, logger: &Logger) {
    let NodeData::Element { attrs, .. } = &element.data else {
        return;
    };
    attrs.borrow_mut().retain(|attr| {
        let name = serialize::attribute_name(attr);
        let allowed = ALLOWED_ATTRIBUTES.contains(&name.as_str());
        if !allowed {
            logger.warn(&format!(
                "Warning (content[{index}]): attribute {name} isn't allowed."
            ));
        }
        allowed
    });
}

/// Registers and rewrites an `<img>`; returns `false` if it must be removed.
fn rewrite_image(index: usize, element: &Handle, images: &mut ImageTable, logger: &Logger) -> bool {
    let NodeData::Element { attrs, .. } = &element.data else {
        return false;
    };
    let mut attrs = attrs.borrow_mut();

    let source = attrs
        .iter()
        .find(|attr| &*attr.name.local == "src")
        .map(|attr| attr.value.trim().to_string());
    let Some(source) = source else {
        return false;
    };
    if !is_resolvable(&source) {
        logger.warn(&format!(
            "Warning (content[{index}]): image source `{source}` can't be downloaded; image removed."
        ));
        return false;
    }

    let href = images.register(&source).href();
    for attr in attrs.iter_mut() {
        if &*attr.name.local == "src" {
            attr.value = href.as_str().into();
        }
    }

    match attrs
        .iter_mut()
        .find(|attr| &*attr.name.local == "alt")
    {
        Some(alt) if alt.value.trim().is_empty() => alt.value = PLACEHOLDER_ALT.into(),
        Some(_) => {}
        None => attrs.push(Attribute {
            name: QualName::new(None, ns!(), LocalName::from("alt")),
            value: PLACEHOLDER_ALT.into(),
        }),
    }
    true
}

/// A source is resolvable when it is an absolute `http` or `https` URL;
/// `data:` URLs are not.
fn is_resolvable(source: &str) -> bool {
    Url::parse(source).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
