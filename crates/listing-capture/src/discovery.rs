//! Multi-strategy image discovery.
//!
//! Four independent strategies feed one [`DiscoveredImageSet`]: `<img>` tags
//! (`src` and `srcset`), gallery traversal, inline background images and
//! `data-src`/`data-image` attributes. The set is additive, so the final
//! contents do not depend on which strategy finds an image first.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::adapter::SiteAdapter;
use crate::config::Timings;
use crate::gallery::{traverse_gallery, TraversalState};
use crate::renderer::{Locator, PageDriver, Selector};
use crate::urlset::{background_image_url, parse_srcset, DiscoveredImageSet};

const IMAGE_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub from_img_tags: usize,
    pub gallery: TraversalState,
    pub from_backgrounds: usize,
    pub from_data_attributes: usize,
    /// Canonical URLs in ascending order.
    pub urls: Vec<String>,
}

/// Poll until at least one adapter image is present, up to `timeout`.
pub async fn wait_for_first_image(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    timeout: Duration,
) -> bool {
    let locator = adapter.image_locator();
    let deadline = Instant::now() + timeout;
    loop {
        if matches!(page.query(&locator).await, Ok(found) if !found.is_empty()) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        page.wait(IMAGE_POLL_INTERVAL).await;
    }
}

/// Run every discovery strategy and return the deduplicated result.
pub async fn discover_images(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    timings: &Timings,
    max_gallery_attempts: usize,
) -> DiscoveryReport {
    let mut set = DiscoveredImageSet::new();

    let from_img_tags = from_img_tags(page, adapter, &mut set).await;
    tracing::info!(count = set.len(), "Unique images from <img> tags");

    let gallery = traverse_gallery(page, adapter, &mut set, timings, max_gallery_attempts).await;

    let from_backgrounds = from_backgrounds(page, adapter, &mut set).await;
    let from_data_attributes = from_data_attributes(page, adapter, &mut set).await;
    tracing::debug!(
        from_backgrounds,
        from_data_attributes,
        "Secondary strategies finished"
    );

    DiscoveryReport {
        from_img_tags,
        gallery,
        from_backgrounds,
        from_data_attributes,
        urls: set.sorted(),
    }
}

async fn from_img_tags(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    set: &mut DiscoveredImageSet,
) -> usize {
    let Ok(images) = page.query(&Locator::from(Selector::tag("img"))).await else {
        return 0;
    };
    let mut added = 0;
    for img in images {
        // Stale handles are skipped silently.
        if let Ok(Some(src)) = page.attribute(&img, "src").await {
            added += usize::from(set.add(adapter, &src));
        }
        if let Ok(Some(srcset)) = page.attribute(&img, "srcset").await {
            added += set.extend(adapter, parse_srcset(&srcset));
        }
    }
    added
}

async fn from_backgrounds(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    set: &mut DiscoveredImageSet,
) -> usize {
    let locator = Locator::from(Selector::any().attr_contains("style", "background-image"));
    let Ok(elements) = page.query(&locator).await else {
        return 0;
    };
    let mut added = 0;
    for el in elements {
        if let Ok(Some(style)) = page.attribute(&el, "style").await {
            if let Some(url) = background_image_url(&style) {
                added += usize::from(set.add(adapter, url));
            }
        }
    }
    added
}

async fn from_data_attributes(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    set: &mut DiscoveredImageSet,
) -> usize {
    let Ok(elements) = page.query(&adapter.data_attr_locator()).await else {
        return 0;
    };
    let mut added = 0;
    for el in elements {
        let value = match page.attribute(&el, "data-src").await {
            Ok(Some(v)) if !v.is_empty() => Some(v),
            Ok(_) => page.attribute(&el, "data-image").await.ok().flatten(),
            Err(_) => None,
        };
        if let Some(value) = value {
            added += usize::from(set.add(adapter, &value));
        }
    }
    added
}
