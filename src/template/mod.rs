//! Built-in package templates and their renderer.
//!
//! The [`AssetStore`] maps asset names (`content.opf`, `template.css`, ...)
//! to source text. [`TemplateRenderer`] compiles every Handlebars asset
//! (`*.hbs`) in a store once and renders them by name against a JSON record.

use std::collections::BTreeMap;

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

/// Package document.
pub const CONTENT_OPF: &str = "content.opf";
/// NCX navigation for EPUB 2 readers.
pub const TOC_NCX: &str = "toc.ncx";
/// Navigation page.
pub const TOC_XHTML: &str = "toc.xhtml";
/// Per-chapter document wrapper.
pub const CHAPTER_XHTML: &str = "chapter.xhtml";
/// Cover page.
pub const COVER_XHTML: &str = "cover.xhtml";
/// Default stylesheet, served verbatim.
pub const TEMPLATE_CSS: &str = "template.css";
/// `META-INF/container.xml`, served verbatim.
pub const CONTAINER_XML: &str = "container.xml";

const TEMPLATE_SUFFIX: &str = ".hbs";

/// Template rendering or lookup failure. Always fatal.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template asset `{template}` not found")]
    MissingAsset { template: String },

    #[error("template `{template}` failed to compile: {source}")]
    Compile {
        template: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("template `{template}` failed to render: {source}")]
    Render {
        template: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

impl TemplateError {
    /// Name of the template involved.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            Self::MissingAsset { template }
            | Self::Compile { template, .. }
            | Self::Render { template, .. } => template,
        }
    }
}

/// Read-only lookup from asset name to source text.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    assets: BTreeMap<String, String>,
}

impl AssetStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The templates and stylesheet shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        let mut store = Self::new();
        store.insert(
            "content.opf.hbs",
            include_str!("../../templates/content.opf.hbs"),
        );
        store.insert("toc.ncx.hbs", include_str!("../../templates/toc.ncx.hbs"));
        store.insert(
            "toc.xhtml.hbs",
            include_str!("../../templates/toc.xhtml.hbs"),
        );
        store.insert(
            "chapter.xhtml.hbs",
            include_str!("../../templates/chapter.xhtml.hbs"),
        );
        store.insert(
            "cover.xhtml.hbs",
            include_str!("../../templates/cover.xhtml.hbs"),
        );
        store.insert(TEMPLATE_CSS, include_str!("../../templates/template.css"));
        store.insert(CONTAINER_XML, include_str!("../../templates/container.xml"));
        store
    }

    /// Adds or replaces an asset.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.assets.insert(name.into(), source.into());
    }

    /// Looks up an asset by its full name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingAsset`] if no asset has that name.
    pub fn get(&self, name: &str) -> Result<&str, TemplateError> {
        self.assets
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| TemplateError::MissingAsset {
                template: name.to_string(),
            })
    }

    fn templates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assets.iter().filter_map(|(name, source)| {
            name.strip_suffix(TEMPLATE_SUFFIX)
                .map(|stem| (stem, source.as_str()))
        })
    }
}

/// Compiled Handlebars templates from an [`AssetStore`].
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
    store: AssetStore,
}

impl TemplateRenderer {
    /// Compiles every `*.hbs` asset, registered under its name without the
    /// suffix.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Compile`] for the first template that does
    /// not parse.
    pub fn new(store: AssetStore) -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);

        for (name, source) in store.templates() {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| TemplateError::Compile {
                    template: name.to_string(),
                    source: Box::new(e),
                })?;
        }
        debug!(
            templates = handlebars.get_templates().len(),
            "templates compiled"
        );

        Ok(Self { handlebars, store })
    }

    /// Renderer over [`AssetStore::builtin`].
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Compile`] if a built-in template is broken.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::new(AssetStore::builtin())
    }

    /// Renders the template `name` with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingAsset`] for an unknown name and
    /// [`TemplateError::Render`] if rendering fails.
    #[instrument(skip(self, data))]
    pub fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError> {
        if !self.handlebars.has_template(name) {
            return Err(TemplateError::MissingAsset {
                template: format!("{name}{TEMPLATE_SUFFIX}"),
            });
        }
        self.handlebars
            .render(name, data)
            .map_err(|e| TemplateError::Render {
                template: name.to_string(),
                source: Box::new(e),
            })
    }

    /// Raw text of a non-template asset such as the stylesheet.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingAsset`] if the asset is absent.
    pub fn asset(&self, name: &str) -> Result<&str, TemplateError> {
        self.store.get(name)
    }
}
