//! Run configuration and environment resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::renderer::chromium::BrowserOptions;

/// Environment variable overriding the default output directory.
pub const OUTPUT_DIR_ENV: &str = "LISTING_CAPTURE_OUTPUT_DIR";

/// Maximum "next" activations in one gallery traversal.
pub const DEFAULT_MAX_GALLERY_ATTEMPTS: usize = 50;

/// Settle intervals and timeouts of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub navigation: Duration,
    /// Wait after navigation before touching the page.
    pub initial_render: Duration,
    /// Per-candidate visibility probe for cookie buttons.
    pub cookie_probe: Duration,
    pub cookie_settle: Duration,
    pub stabilise: Duration,
    pub section_probe: Duration,
    pub section_settle: Duration,
    pub show_more_prewait: Duration,
    pub show_more_probe: Duration,
    pub show_more_settle: Duration,
    /// Bound on waiting for the first matching image.
    pub image_wait: Duration,
    pub gallery_open: Duration,
    /// Wait after clicking the first image.
    pub gallery_open_settle: Duration,
    /// Wait inside every harvest/advance iteration.
    pub gallery_step_settle: Duration,
    pub gallery_next_probe: Duration,
    pub gallery_close_probe: Duration,
    pub head_timeout: Duration,
    /// Bound on the secondary asset download.
    pub asset_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(10),
            initial_render: Duration::from_secs(2),
            cookie_probe: Duration::from_secs(1),
            cookie_settle: Duration::from_secs(1),
            stabilise: Duration::from_secs(2),
            section_probe: Duration::from_millis(300),
            section_settle: Duration::from_secs(1),
            show_more_prewait: Duration::from_secs(3),
            show_more_probe: Duration::from_millis(500),
            show_more_settle: Duration::from_millis(1500),
            image_wait: Duration::from_secs(10),
            gallery_open: Duration::from_secs(2),
            gallery_open_settle: Duration::from_secs(1),
            gallery_step_settle: Duration::from_millis(500),
            gallery_next_probe: Duration::from_secs(1),
            gallery_close_probe: Duration::from_secs(1),
            head_timeout: Duration::from_secs(10),
            asset_timeout: Duration::from_secs(15),
        }
    }
}

impl Timings {
    /// All waits and probes zeroed. Useful against in-memory pages.
    pub fn instant() -> Self {
        let zero = Duration::ZERO;
        Self {
            navigation: Duration::from_secs(1),
            initial_render: zero,
            cookie_probe: zero,
            cookie_settle: zero,
            stabilise: zero,
            section_probe: zero,
            section_settle: zero,
            show_more_prewait: zero,
            show_more_probe: zero,
            show_more_settle: zero,
            image_wait: zero,
            gallery_open: zero,
            gallery_open_settle: zero,
            gallery_step_settle: zero,
            gallery_next_probe: zero,
            gallery_close_probe: zero,
            head_timeout: Duration::from_secs(1),
            asset_timeout: Duration::from_secs(1),
        }
    }
}

/// Everything one capture run needs. Passed explicitly; nothing is global.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: String,
    /// Skip discovery and enrichment; only capture the page.
    pub skip_images: bool,
    pub output_dir: PathBuf,
    pub browser: BrowserOptions,
    pub timings: Timings,
    /// Concurrent HEAD requests (1 = sequential).
    pub enrich_concurrency: usize,
    pub capture_pdf: bool,
    pub capture_screenshot: bool,
    pub max_gallery_attempts: usize,
}

impl RunConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            skip_images: false,
            output_dir: PathBuf::from("."),
            browser: BrowserOptions::default(),
            timings: Timings::default(),
            enrich_concurrency: 1,
            capture_pdf: true,
            capture_screenshot: true,
            max_gallery_attempts: DEFAULT_MAX_GALLERY_ATTEMPTS,
        }
    }
}

/// Resolve the output directory.
///
/// Order: explicit argument, `LISTING_CAPTURE_OUTPUT_DIR`, current directory.
pub fn resolve_output_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var(OUTPUT_DIR_ENV) {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    PathBuf::from(".")
}
