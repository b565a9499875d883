//! Core data types and errors shared across the capture pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::urlset::file_name;

/// Placeholder written when an image has no `Last-Modified` header.
pub const NO_DATE: &str = "No date available";

/// Placeholder written when the metadata request itself failed.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Last-Modified metadata for one discovered image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LastModified {
    /// Normalised `YYYY-MM-DD HH:MM:SS` timestamp.
    Date(String),
    /// The server answered without a `Last-Modified` header.
    NoDate,
    /// The request failed at the transport level.
    Unknown,
}

impl fmt::Display for LastModified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastModified::Date(date) => f.write_str(date),
            LastModified::NoDate => f.write_str(NO_DATE),
            LastModified::Unknown => f.write_str(UNKNOWN_DATE),
        }
    }
}

/// One canonical image URL with its enrichment result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub url: String,
    pub last_modified: LastModified,
}

impl ImageRecord {
    /// Final path segment of the URL, used as the listing file name column.
    pub fn filename(&self) -> &str {
        file_name(&self.url)
    }
}

/// Paths of everything a run wrote to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputPaths {
    pub dated_listing: Option<PathBuf>,
    pub url_listing: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    pub original_pdf: Option<PathBuf>,
}

/// Counts reported at the end of every successful run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub site: String,
    pub listing_id: String,
    pub url: String,
    pub images_found: usize,
    pub sections_expanded: usize,
    pub sections_already_open: usize,
    pub sections_not_found: usize,
    pub buttons_clicked: usize,
    pub gallery_steps: usize,
    pub cookie_banner_dismissed: bool,
    pub images_skipped: bool,
    pub records: Vec<ImageRecord>,
    pub outputs: OutputPaths,
}

/// Errors raised by a page capability backend.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Element is no longer attached to the document")]
    StaleElement,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Page is closed")]
    Closed,

    #[error("Browser error: {0}")]
    Backend(String),
}

impl DriverError {
    /// Stale handles come from benign re-render races and are skipped quietly.
    pub fn is_stale(&self) -> bool {
        matches!(self, DriverError::StaleElement)
    }
}

/// Errors that abort a capture run.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("Unsupported site: {0}")]
    UnsupportedSite(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Page error: {0}")]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type CaptureResult<T> = Result<T, CaptureError>;
