//! Package assembly.
//!
//! [`EpubBuilder`] drives a build through the [`BuildStage`]s in order,
//! collecting [`OutputFile`]s into a duplicate-free [`PackageFiles`] list
//! that the [`Archiver`] finally turns into container bytes.

mod archive;
mod builder;
mod render;

use std::collections::HashSet;
use std::fmt;

pub use archive::{ArchiveError, Archiver, EPUB_MIMETYPE, MIMETYPE_PATH, ZipArchiver};
pub use builder::{AssembledPackage, EpubBuilder};

/// A path and payload destined for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Archive-relative path, e.g. `OEBPS/content.opf`.
    pub path: String,
    pub data: Vec<u8>,
}

impl OutputFile {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Ordered output file set that refuses duplicate paths.
#[derive(Debug, Clone, Default)]
pub struct PackageFiles {
    files: Vec<OutputFile>,
    paths: HashSet<String>,
}

impl PackageFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a file.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::DuplicatePath`] if the path is already taken.
    pub fn push(&mut self, file: OutputFile) -> Result<(), ArchiveError> {
        if !self.paths.insert(file.path.clone()) {
            return Err(ArchiveError::DuplicatePath { path: file.path });
        }
        self.files.push(file);
        Ok(())
    }

    /// Appends files in order, stopping at the first duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::DuplicatePath`] for the first repeated path.
    pub fn extend(
        &mut self,
        files: impl IntoIterator<Item = OutputFile>,
    ) -> Result<(), ArchiveError> {
        files.into_iter().try_for_each(|file| self.push(file))
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&OutputFile> {
        self.files.iter().find(|file| file.path == path)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[OutputFile] {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<OutputFile> {
        self.files
    }
}

/// Assembly stages, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    Normalize,
    SanitizeChapters,
    RenderMetadataTemplates,
    ResolveFonts,
    ResolveImages,
    ResolveCover,
    Done,
}

impl BuildStage {
    /// The stage after this one; `Done` is terminal.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Normalize => Self::SanitizeChapters,
            Self::SanitizeChapters => Self::RenderMetadataTemplates,
            Self::RenderMetadataTemplates => Self::ResolveFonts,
            Self::ResolveFonts => Self::ResolveImages,
            Self::ResolveImages => Self::ResolveCover,
            Self::ResolveCover | Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Normalize => "normalize",
            Self::SanitizeChapters => "sanitize-chapters",
            Self::RenderMetadataTemplates => "render-metadata-templates",
            Self::ResolveFonts => "resolve-fonts",
            Self::ResolveImages => "resolve-images",
            Self::ResolveCover => "resolve-cover",
            Self::Done => "done",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_package_files_rejects_duplicate_paths() {
        let mut files = PackageFiles::new();
        files.push(OutputFile::new("OEBPS/a.xhtml", "a")).unwrap();
        let error = files
            .push(OutputFile::new("OEBPS/a.xhtml", "b"))
            .unwrap_err();
        assert!(matches!(error, ArchiveError::DuplicatePath { ref path } if path == "OEBPS/a.xhtml"));
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("OEBPS/a.xhtml").unwrap().data, b"a");
    }

    #[test]
    fn test_package_files_keep_insertion_order() {
        let mut files = PackageFiles::new();
        files
            .extend(["c", "a", "b"].map(|name| OutputFile::new(name, Vec::new())))
            .unwrap();
        let paths: Vec<_> = files.as_slice().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_stages_only_move_forward() {
        let mut stage = BuildStage::Normalize;
        let mut seen = vec![stage];
        while stage != BuildStage::Done {
            let next = stage.next();
            assert!(next > stage);
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(BuildStage::Done.next(), BuildStage::Done);
        assert_eq!(BuildStage::ResolveImages.to_string(), "resolve-images");
    }
}
