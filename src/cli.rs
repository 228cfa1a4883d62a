//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use epubgen::{EpubOptions, RawChapter};

/// Assemble an EPUB package from a JSON build file or a plain-text book.
///
/// JSON input holds `options` and `chapters`; `.txt` input is split into
/// chapters on `Chapter N` / `第N章` heading lines.
#[derive(Parser, Debug)]
#[command(name = "epubgen")]
#[command(author, version, about)]
pub struct Args {
    /// Build file (`.json`) or plain-text book (`.txt`)
    pub input: PathBuf,

    /// Output file (default: input path with an `.epub` extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Book title for text input (default: input file name)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Resources fetched concurrently per wave (1-1000)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub batch_size: Option<u16>,

    /// Total download attempts per resource (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub retry_times: Option<u8>,

    /// Per-attempt download timeout in milliseconds (1-600000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=600_000))]
    pub timeout_ms: Option<u32>,

    /// Write empty files for resources that cannot be downloaded instead of failing
    #[arg(long)]
    pub ignore_failed_downloads: bool,

    /// EPUB version to produce (2 or 3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(2..=3))]
    pub epub_version: Option<u8>,
}

impl Args {
    /// Output path, defaulting to the input with an `.epub` extension.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("epub"))
    }

    /// Applies command-line overrides on top of file options.
    pub fn apply_overrides(&self, options: &mut EpubOptions) {
        if let Some(title) = &self.title {
            options.title.clone_from(title);
        }
        if let Some(batch_size) = self.batch_size {
            options.batch_size = Some(i64::from(batch_size));
        }
        if let Some(retry_times) = self.retry_times {
            options.retry_times = Some(i64::from(retry_times));
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.fetch_timeout = Some(i64::from(timeout_ms));
        }
        if self.ignore_failed_downloads {
            options.ignore_failed_downloads = Some(true);
        }
        if let Some(version) = self.epub_version {
            options.version = Some(i64::from(version));
        }
        if self.quiet {
            options.verbose = epubgen::LogPolicy::Silent;
        }
    }
}

/// Contents of a JSON build file.
#[derive(Debug, Deserialize)]
pub struct BuildFile {
    #[serde(default)]
    pub options: EpubOptions,
    pub chapters: Vec<RawChapter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_input() {
        let result = Args::try_parse_from(["epubgen"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["epubgen", "book.json"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.batch_size, None);
        assert_eq!(args.output_path(), PathBuf::from("book.epub"));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["epubgen", "-vv", "book.json"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["epubgen", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["epubgen", "--version"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["epubgen", "--invalid-flag", "book.json"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_batch_size_zero_rejected() {
        let result = Args::try_parse_from(["epubgen", "-b", "0", "book.json"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_epub_version_out_of_range_rejected() {
        let result = Args::try_parse_from(["epubgen", "--epub-version", "4", "book.json"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let args = Args::try_parse_from([
            "epubgen",
            "-b",
            "5",
            "-r",
            "2",
            "--timeout-ms",
            "1500",
            "--ignore-failed-downloads",
            "-o",
            "out.epub",
            "book.json",
        ])
        .unwrap();
        let mut options = EpubOptions::titled("T");
        options.batch_size = Some(50);
        args.apply_overrides(&mut options);
        assert_eq!(options.batch_size, Some(5));
        assert_eq!(options.retry_times, Some(2));
        assert_eq!(options.fetch_timeout, Some(1500));
        assert_eq!(options.ignore_failed_downloads, Some(true));
        assert_eq!(options.title, "T");
        assert_eq!(args.output_path(), PathBuf::from("out.epub"));
    }

    #[test]
    fn test_build_file_deserializes() {
        let file: BuildFile = serde_json::from_str(
            r#"{"options":{"title":"T","authors":["A"]},"chapters":[{"title":"Ch1","content":"<p>Hi</p>"}]}"#,
        )
        .unwrap();
        assert_eq!(file.options.title, "T");
        assert_eq!(file.chapters.len(), 1);
    }
}
