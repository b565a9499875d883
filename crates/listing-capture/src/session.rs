//! Session bootstrap: navigation, cookie banner, stabilisation.

use serde::Serialize;

use crate::adapter::SiteAdapter;
use crate::config::Timings;
use crate::renderer::{first_visible, Locator, NavigationResult, PageDriver};
use crate::types::{CaptureError, CaptureResult};

/// Outcome of bringing a page into an interactive state.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub navigation: NavigationResult,
    /// Index of the cookie selector that was clicked, if any.
    pub cookie_selector: Option<usize>,
}

/// Navigate to `url`, dismiss the cookie banner and let the page settle.
///
/// Only navigation failure is fatal. A missing cookie banner is the normal
/// case on repeat visits.
pub async fn bootstrap(
    page: &mut dyn PageDriver,
    adapter: &SiteAdapter,
    url: &str,
    timings: &Timings,
) -> CaptureResult<BootstrapReport> {
    tracing::info!(url, site = %adapter.id, "Loading listing page");
    let navigation = page
        .navigate(url, timings.navigation)
        .await
        .map_err(|e| CaptureError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    tracing::debug!(load_time_ms = navigation.load_time_ms, "Page loaded");

    page.wait(timings.initial_render).await;

    let cookie_selector = dismiss_cookies(&*page, adapter, timings).await;
    if cookie_selector.is_none() {
        tracing::info!("No cookie banner found");
    }

    page.wait(timings.stabilise).await;

    Ok(BootstrapReport {
        navigation,
        cookie_selector,
    })
}

/// Click the first cookie candidate that becomes visible.
pub async fn dismiss_cookies(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    timings: &Timings,
) -> Option<usize> {
    for (index, selector) in adapter.cookie_selectors.iter().enumerate() {
        let locator = Locator::from(selector.clone());
        let Some(button) = first_visible(page, &locator, timings.cookie_probe).await else {
            continue;
        };
        match page.click(&button).await {
            Ok(()) => {
                tracing::info!(selector = %selector, "Cookie banner dismissed");
                page.wait(timings.cookie_settle).await;
                return Some(index);
            }
            Err(e) if e.is_stale() => continue,
            Err(e) => tracing::debug!("Cookie click on {selector} failed: {e}"),
        }
    }
    None
}
