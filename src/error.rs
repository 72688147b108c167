//! Errors produced by the record-fetch pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Terminal failure of a single pipeline run.
///
/// Every variant is reported to the caller as a 500 with the `Display`
/// text as body; nothing is retried.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The reference does not name a retrievable record.
    #[error("Filename '{0}' is invalid.")]
    InvalidReference(String),

    /// One or more local artifacts required by the annotator are absent.
    #[error("Could not find:{}", format_missing(.0))]
    MissingDependency(Vec<PathBuf>),

    #[error("Could not retrieve contents from {0}")]
    DownloadFailed(String),

    /// The annotator wrote diagnostics, exited non-zero, or timed out.
    #[error("Error executing segment_level_inference\n{0}")]
    AnnotationFailed(String),

    #[error("Malformed label line {index}: '{line}'")]
    MalformedLabelLine { line: String, index: usize },

    #[error("Could not resolve video id: {0}")]
    IdentityResolutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_missing(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!(" '{}'", p.display()))
        .collect::<String>()
}
