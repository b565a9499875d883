//! Last-Modified metadata via HTTP HEAD.

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};

use crate::types::{CaptureError, CaptureResult, ImageRecord, LastModified};

/// User agent sent with every metadata and asset request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build the HTTP client shared by the enricher and asset downloads.
pub fn build_client(timeout: Duration) -> CaptureResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(USER_AGENT)
        .build()
        .map_err(CaptureError::from)
}

/// Parse any of the three HTTP-date forms: IMF-fixdate (RFC 1123), the
/// obsolete RFC 850 form and C `asctime()` output.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Obsolete forms carry no offset; both are GMT by definition.
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Normalise an HTTP date to `YYYY-MM-DD HH:MM:SS`.
///
/// The calendar date is taken in UTC and the time of day in `tz`, so near
/// midnight the two halves can disagree. Existing listing files rely on
/// this format.
pub fn format_last_modified<Tz>(header: &str, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let parsed = parse_http_date(header)?;
    let date = parsed.format("%Y-%m-%d");
    let time = parsed.with_timezone(tz).format("%H:%M:%S");
    Some(format!("{date} {time}"))
}

/// Fetches `Last-Modified` for canonical image URLs.
#[derive(Clone)]
pub struct MetadataEnricher {
    client: reqwest::Client,
    concurrency: usize,
}

impl MetadataEnricher {
    pub fn new(timeout: Duration, concurrency: usize) -> CaptureResult<Self> {
        Ok(Self::with_client(build_client(timeout)?, concurrency))
    }

    pub fn with_client(client: reqwest::Client, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// One record per URL, in input order. Never fails as a whole.
    pub async fn enrich(&self, urls: &[String]) -> Vec<ImageRecord> {
        let total = urls.len();
        tracing::info!(total, concurrency = self.concurrency, "Fetching image metadata");

        stream::iter(urls.iter().enumerate())
            .map(|(i, url)| async move {
                let last_modified = self.last_modified(url).await;
                tracing::debug!(progress = i + 1, total, url = %url, "{last_modified}");
                ImageRecord {
                    url: url.clone(),
                    last_modified,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// HEAD a single URL. Non-2xx statuses are still read for the header.
    pub async fn last_modified(&self, url: &str) -> LastModified {
        let resp = match self.client.head(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(url, "Metadata request failed: {e}");
                return LastModified::Unknown;
            }
        };

        let Some(header) = resp.headers().get(reqwest::header::LAST_MODIFIED) else {
            return LastModified::NoDate;
        };
        last_modified_from_header(url, header.as_bytes())
    }
}

/// Interpret a present `Last-Modified` value. Anything unreadable counts as
/// unknown, never as absent.
fn last_modified_from_header(url: &str, raw: &[u8]) -> LastModified {
    let formatted = std::str::from_utf8(raw)
        .ok()
        .filter(|s| s.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b)))
        .and_then(|header| format_last_modified(header, &Local));
    match formatted {
        Some(date) => LastModified::Date(date),
        None => {
            tracing::warn!(url, header = %String::from_utf8_lossy(raw), "Unparsable Last-Modified header");
            LastModified::Unknown
        }
    }
}
