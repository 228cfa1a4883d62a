//! Top-level build error.

use thiserror::Error;

use crate::fetch::{FetchError, ResourceError};
use crate::normalize::ValidationError;
use crate::package::ArchiveError;
use crate::sanitize::MarkupError;
use crate::template::TemplateError;

/// First fatal cause of a failed build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid build input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The default HTTP fetcher could not be created.
    #[error("failed to initialize HTTP client: {0}")]
    Client(#[from] FetchError),
}
