//! Flat output files and page artifacts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;

use crate::renderer::{PageDriver, PdfOptions};
use crate::types::{CaptureResult, ImageRecord};

/// `image-urls-<site>.txt`: file names with their Last-Modified value.
pub fn dated_listing_name(site: &str) -> String {
    format!("image-urls-{site}.txt")
}

/// `image-urls-only-<site>.txt`: canonical URLs, one per line.
pub fn url_listing_name(site: &str) -> String {
    format!("image-urls-only-{site}.txt")
}

/// Common stem of the page artifacts: `<listing>_<YYYY-MM-DD>_<site>`.
pub fn artifact_base(listing_id: &str, date: NaiveDate, site: &str) -> String {
    format!("{listing_id}_{}_{site}", date.format("%Y-%m-%d"))
}

/// `<filename> | <last-modified>` lines, no trailing newline.
pub fn render_dated_listing(records: &[ImageRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{} | {}", r.filename(), r.last_modified))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One URL per line, no trailing newline.
pub fn render_url_listing(urls: &[String]) -> String {
    urls.join("\n")
}

/// Write both listing files into `dir`, returning (dated, urls-only).
pub fn write_listings(
    dir: &Path,
    site: &str,
    records: &[ImageRecord],
    urls: &[String],
) -> CaptureResult<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;

    let dated = dir.join(dated_listing_name(site));
    std::fs::write(&dated, render_dated_listing(records))?;

    let only = dir.join(url_listing_name(site));
    std::fs::write(&only, render_url_listing(urls))?;

    tracing::info!(path = %dated.display(), "Image URLs with dates saved");
    tracing::info!(path = %only.display(), "URL-only listing saved");
    Ok((dated, only))
}

/// Which page artifacts to capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureToggles {
    pub pdf: bool,
    pub screenshot: bool,
}

/// Render the page to `<base>.pdf` and `<base>.png`.
///
/// Screen media is emulated first so print stylesheets do not hide content.
pub async fn capture_page(
    page: &dyn PageDriver,
    dir: &Path,
    base: &str,
    toggles: CaptureToggles,
) -> CaptureResult<(Option<PathBuf>, Option<PathBuf>)> {
    if !toggles.pdf && !toggles.screenshot {
        return Ok((None, None));
    }
    std::fs::create_dir_all(dir)?;

    let mut pdf_path = None;
    if toggles.pdf {
        page.emulate_screen_media().await?;
        let bytes = page.pdf(&PdfOptions::default()).await?;
        let path = dir.join(format!("{base}.pdf"));
        std::fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), "PDF saved");
        pdf_path = Some(path);
    }

    let mut png_path = None;
    if toggles.screenshot {
        let bytes = page.screenshot(true).await?;
        let path = dir.join(format!("{base}.png"));
        std::fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), "Screenshot saved");
        png_path = Some(path);
    }

    Ok((pdf_path, png_path))
}

/// Download a site-published PDF to `dest`.
///
/// Unavailable assets are logged and reported as `None`; only a failing
/// local write is an error.
pub async fn download_asset(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> CaptureResult<Option<PathBuf>> {
    tracing::info!(url, "Attempting to download original PDF");
    let resp = match client.get(url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::info!("PDF not available: {e}");
            return Ok(None);
        }
    };
    if !resp.status().is_success() {
        tracing::info!(status = resp.status().as_u16(), "PDF not available");
        return Ok(None);
    }
    let bytes = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::info!("PDF download interrupted: {e}");
            return Ok(None);
        }
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &bytes)?;
    tracing::info!(path = %dest.display(), "Original PDF downloaded");
    Ok(Some(dest.to_path_buf()))
}
