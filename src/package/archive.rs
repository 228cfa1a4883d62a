//! Archiver boundary: turns the final file list into EPUB container bytes.

use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::{debug, instrument};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::OutputFile;

/// Name of the first archive entry.
pub const MIMETYPE_PATH: &str = "mimetype";

/// Contents of the `mimetype` entry.
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// Deflate level for everything but `mimetype`.
const COMPRESSION_LEVEL: i64 = 6;

/// Failure assembling or writing the container.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("duplicate archive path `{path}`")]
    DuplicatePath { path: String },

    #[error("failed to write archive entry `{path}`: {source}")]
    Zip {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to write archive entry `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the final package bytes from an ordered, duplicate-free file list.
pub trait Archiver {
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the container cannot be written.
    fn archive(&self, files: &[OutputFile]) -> Result<Vec<u8>, ArchiveError>;
}

/// Zip container with an uncompressed leading `mimetype` entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    #[instrument(skip(self, files), fields(files = files.len()))]
    fn archive(&self, files: &[OutputFile]) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL));

        write_entry(&mut zip, MIMETYPE_PATH, EPUB_MIMETYPE.as_bytes(), stored)?;
        for file in files.iter().filter(|file| file.path != MIMETYPE_PATH) {
            write_entry(&mut zip, &file.path, &file.data, deflated)?;
        }

        let cursor = zip.finish().map_err(|source| ArchiveError::Zip {
            path: String::new(),
            source,
        })?;
        let bytes = cursor.into_inner();
        debug!(bytes = bytes.len(), "archive written");
        Ok(bytes)
    }
}

fn write_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    path: &str,
    data: &[u8],
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    zip.start_file(path, options)
        .map_err(|source| ArchiveError::Zip {
            path: path.to_string(),
            source,
        })?;
    zip.write_all(data).map_err(|source| ArchiveError::Io {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;

    #[test]
    fn test_mimetype_is_first_and_stored() {
        let files = vec![
            OutputFile::new("OEBPS/style.css", b"p {}".to_vec()),
            OutputFile::new("OEBPS/images/image_0.png", Vec::new()),
        ];
        let bytes = ZipArchiver.archive(&files).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        let mut text = String::new();
        first.read_to_string(&mut text).unwrap();
        assert_eq!(text, "application/epub+zip");
        drop(first);

        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&"OEBPS/images/image_0.png".to_string()));
        assert_eq!(archive.by_name("OEBPS/images/image_0.png").unwrap().size(), 0);
    }

    #[test]
    fn test_mimetype_in_file_list_is_not_written_twice() {
        let files = vec![OutputFile::new(MIMETYPE_PATH, b"text/plain".to_vec())];
        let bytes = ZipArchiver.archive(&files).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
    }
}
