//! CLI entry point for the epubgen tool.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use epubgen::{EpubOptions, RawChapter, text};
use tracing::{debug, info};

mod cli;

use cli::{Args, BuildFile};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let (mut options, chapters) = load_input(&args.input)?;
    args.apply_overrides(&mut options);
    let output = args.output_path();

    info!(
        input = %args.input.display(),
        output = %output.display(),
        chapters = chapters.len(),
        "Building EPUB"
    );

    let bytes = epubgen::build(options, &chapters)
        .await
        .context("EPUB build failed")?;
    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(bytes = bytes.len(), output = %output.display(), "EPUB written");
    Ok(())
}

/// Reads a JSON build file, or splits a `.txt` book into chapters.
fn load_input(path: &Path) -> Result<(EpubOptions, Vec<RawChapter>)> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if is_text {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let chapters = text::split_chapters(&contents);
        if chapters.is_empty() {
            bail!("{} contains no text", path.display());
        }
        return Ok((EpubOptions::titled(title), chapters));
    }

    let file: BuildFile = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid build file", path.display()))?;
    Ok((file.options, file.chapters))
}
