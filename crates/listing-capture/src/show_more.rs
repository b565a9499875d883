//! Truncated content: style injection and "show more" controls.

use serde::Serialize;

use crate::adapter::SiteAdapter;
use crate::config::Timings;
use crate::renderer::{Locator, PageDriver};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShowMoreReport {
    pub style_injected: bool,
    pub clicked: usize,
    /// Index of the selector candidate that produced the clicks.
    pub selector_index: Option<usize>,
}

/// Remove truncation on the page.
///
/// Selector candidates are tried in order; once one of them produces a
/// click the remaining candidates are skipped. No clicks is a normal outcome.
pub async fn expand_truncated(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    timings: &Timings,
) -> ShowMoreReport {
    let mut report = ShowMoreReport::default();

    if let Some(css) = &adapter.truncation_css {
        match page.add_style(css).await {
            Ok(()) => report.style_injected = true,
            Err(e) => tracing::warn!("Could not inject truncation CSS: {e}"),
        }
    }

    if adapter.show_more_selectors.is_empty() {
        return report;
    }

    tracing::info!("Looking for show-more buttons");
    page.wait(timings.show_more_prewait).await;

    for (index, selector) in adapter.show_more_selectors.iter().enumerate() {
        let Ok(buttons) = page.query(&Locator::from(selector.clone())).await else {
            continue;
        };
        if !buttons.is_empty() {
            tracing::debug!(count = buttons.len(), selector = %selector, "Show-more candidates");
        }

        let mut clicked = 0;
        for button in &buttons {
            let text = match page.text(button).await {
                Ok(text) => text,
                Err(_) => continue,
            };
            if !adapter.wants_show_more(&text) {
                continue;
            }
            if !matches!(page.is_visible(button, timings.show_more_probe).await, Ok(true)) {
                continue;
            }
            match page.click(button).await {
                Ok(()) => {
                    clicked += 1;
                    tracing::info!(text = text.trim(), "Clicked show-more button");
                    page.wait(timings.show_more_settle).await;
                }
                Err(e) if e.is_stale() => continue,
                Err(e) => tracing::debug!("Show-more click failed: {e}"),
            }
        }

        if clicked > 0 {
            report.clicked = clicked;
            report.selector_index = Some(index);
            break;
        }
    }

    if report.clicked == 0 {
        tracing::warn!("No show-more buttons found or clicked");
    }
    report
}
