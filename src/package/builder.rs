//! Build orchestration.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::render::render_package;
use super::{Archiver, BuildStage, OutputFile, PackageFiles, ZipArchiver};
use crate::assets::{ImageTable, ResourceKind, SealedImages};
use crate::config::{BuildConfig, EpubOptions, NormalizedChapter, RawChapter};
use crate::error::BuildError;
use crate::fetch::{Fetcher, HttpFetcher, ResourceRequest, ResourceResolver};
use crate::logging::Logger;
use crate::normalize::{normalize_chapters, normalize_options};
use crate::sanitize::sanitize_chapters;
use crate::template::{AssetStore, TemplateRenderer};

/// Result of a completed assembly, before archiving.
#[derive(Debug)]
pub struct AssembledPackage {
    /// Package identifier written to the package document.
    pub book_id: String,
    /// Every archive entry except `mimetype`, in archive order.
    pub files: PackageFiles,
    /// Images discovered in chapter markup.
    pub images: SealedImages,
}

impl AssembledPackage {
    /// Looks up an entry by archive path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&OutputFile> {
        self.files.get(path)
    }
}

/// Assembles one package from validated input.
///
/// Construction runs the `Normalize` stage, so invalid input fails before
/// any other work. [`assemble`](Self::assemble) then runs the remaining
/// stages in order.
///
/// ```no_run
/// use epubgen::config::{EpubOptions, RawChapter};
/// use epubgen::package::EpubBuilder;
///
/// # async fn example() -> Result<(), epubgen::BuildError> {
/// let chapters = [RawChapter::new("Chapter 1", "<p>Hello world!</p>")];
/// let bytes = EpubBuilder::new(EpubOptions::titled("Example"), &chapters)?
///     .build()
///     .await?;
/// std::fs::write("example.epub", bytes).ok();
/// # Ok(())
/// # }
/// ```
pub struct EpubBuilder {
    config: BuildConfig,
    chapters: Vec<NormalizedChapter>,
    logger: Logger,
    book_id: String,
    fetcher: Option<Arc<dyn Fetcher>>,
    assets: AssetStore,
    archiver: Box<dyn Archiver + Send + Sync>,
}

impl EpubBuilder {
    /// Normalizes options and chapters.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Validation`] for invalid input.
    pub fn new(options: EpubOptions, chapters: &[RawChapter]) -> Result<Self, BuildError> {
        let config = normalize_options(options)?;
        let chapters = normalize_chapters(chapters)?;
        let logger = Logger::from_policy(&config.log_policy);

        Ok(Self {
            config,
            chapters,
            logger,
            book_id: format!("urn:uuid:{}", Uuid::new_v4()),
            fetcher: None,
            assets: AssetStore::builtin(),
            archiver: Box::new(ZipArchiver),
        })
    }

    /// Uses `fetcher` instead of a default [`HttpFetcher`].
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replaces the built-in templates.
    #[must_use]
    pub fn with_assets(mut self, assets: AssetStore) -> Self {
        self.assets = assets;
        self
    }

    #[must_use]
    pub fn with_archiver(mut self, archiver: impl Archiver + Send + Sync + 'static) -> Self {
        self.archiver = Box::new(archiver);
        self
    }

    /// Fixes the package identifier instead of a random UUID.
    #[must_use]
    pub fn with_book_id(mut self, book_id: impl Into<String>) -> Self {
        self.book_id = book_id.into();
        self
    }

    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    #[must_use]
    pub fn chapters(&self) -> &[NormalizedChapter] {
        &self.chapters
    }

    /// Runs every stage after `Normalize` and returns the file set.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`BuildError`]: unusable chapter markup, a
    /// template failure, or a resource whose final attempt failed while
    /// failure tolerance is off.
    #[instrument(skip(self), fields(title = %self.config.title, chapters = self.chapters.len()))]
    pub async fn assemble(self) -> Result<AssembledPackage, BuildError> {
        let Self {
            config,
            mut chapters,
            logger,
            book_id,
            fetcher,
            assets,
            ..
        } = self;
        let mut stage = BuildStage::Normalize;
        let mut files = PackageFiles::new();

        stage = enter(stage, BuildStage::SanitizeChapters);
        let mut table = ImageTable::new();
        sanitize_chapters(&mut chapters, &mut table, &logger)?;
        let images = table.seal();

        stage = enter(stage, BuildStage::RenderMetadataTemplates);
        logger.log("Generating Template Files...");
        let renderer = TemplateRenderer::new(assets)?;
        files.extend(render_package(
            &config, &chapters, &images, &book_id, &renderer,
        )?)?;

        let fonts: Vec<_> = config
            .fonts
            .iter()
            .map(|font| ResourceRequest::new(ResourceKind::Font, &font.url, font.archive_path()))
            .collect();
        let image_requests: Vec<_> = images
            .as_slice()
            .iter()
            .map(|image| {
                ResourceRequest::new(ResourceKind::Image, &image.url, image.archive_path())
            })
            .collect();
        let cover: Vec<_> = config
            .cover
            .iter()
            .map(|cover| ResourceRequest::new(ResourceKind::Cover, &cover.url, cover.archive_path()))
            .collect();

        let fetcher = if fonts.is_empty() && image_requests.is_empty() && cover.is_empty() {
            None
        } else {
            match fetcher {
                Some(fetcher) => Some(fetcher),
                None => Some(Arc::new(HttpFetcher::new()?) as Arc<dyn Fetcher>),
            }
        };

        let stages = [
            (BuildStage::ResolveFonts, fonts, "fonts"),
            (BuildStage::ResolveImages, image_requests, "images"),
            (BuildStage::ResolveCover, cover, "cover"),
        ];
        for (next, requests, label) in stages {
            stage = enter(stage, next);
            let Some(fetcher) = fetcher.as_deref().filter(|_| !requests.is_empty()) else {
                logger.log(&format!("No {label} to download"));
                continue;
            };
            logger.log(&format!("Downloading {label}..."));
            let resolver = ResourceResolver::new(fetcher, &config.network, &logger);
            files.extend(resolver.resolve_all(&requests).await?)?;
        }

        enter(stage, BuildStage::Done);
        logger.log("Finishing up...");

        Ok(AssembledPackage {
            book_id,
            files,
            images,
        })
    }

    /// Assembles the package and archives it.
    ///
    /// # Errors
    ///
    /// See [`assemble`](Self::assemble); archiving failures surface as
    /// [`BuildError::Archive`].
    pub async fn build(mut self) -> Result<Vec<u8>, BuildError> {
        let archiver = std::mem::replace(&mut self.archiver, Box::new(ZipArchiver));
        let logger = self.logger.clone();
        let package = self.assemble().await?;
        let bytes = archiver.archive(package.files.as_slice())?;
        logger.log("Done");
        info!(bytes = bytes.len(), files = package.files.len(), "package built");
        Ok(bytes)
    }
}

fn enter(current: BuildStage, next: BuildStage) -> BuildStage {
    debug_assert_eq!(current.next(), next, "stages run in order");
    info!(stage = %next, "entering build stage");
    next
}
