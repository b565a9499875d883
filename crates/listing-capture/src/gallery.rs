//! Lightbox gallery traversal.
//!
//! `Closed -> ModalOpen -> (Harvesting <-> Advancing) -> Closed`. Every
//! iteration re-scans all visible matching images, so slides the gallery
//! renders lazily are picked up whichever position they appear at. The loop
//! is bounded by `max_attempts` even if a "next" control never disappears.

use serde::Serialize;

use crate::adapter::SiteAdapter;
use crate::config::Timings;
use crate::renderer::{first_visible, Locator, PageDriver, Selector};
use crate::urlset::DiscoveredImageSet;

/// Where a traversal ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalState {
    /// Harvest iterations performed.
    pub attempts: usize,
    pub max_attempts: usize,
    /// Whether the last check still found a "next" control.
    pub has_next: bool,
    /// Whether the overlay was ever opened.
    pub modal_open: bool,
    /// New canonical URLs added by the traversal.
    pub harvested: usize,
}

impl TraversalState {
    fn new(max_attempts: usize) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            has_next: false,
            modal_open: false,
            harvested: 0,
        }
    }

    /// The loop continues while a next control exists and the bound is not hit.
    pub fn should_continue(&self) -> bool {
        self.has_next && self.attempts < self.max_attempts
    }
}

/// Overlay containers recognised as an open gallery.
pub fn modal_locator() -> Locator {
    Locator::any([
        Selector::any().attr_eq("role", "dialog"),
        Selector::class("modal"),
        Selector::class("overlay"),
        Selector::class("lightbox"),
    ])
}

/// "Next slide" controls.
pub fn next_locator() -> Locator {
    Locator::any([
        Selector::tag("button").with_text("›"),
        Selector::tag("button").with_text(">"),
        Selector::any().attr_contains_ci("aria-label", "next"),
        Selector::class("next-button"),
        Selector::tag("button").and_class("slick-next"),
    ])
}

/// Overlay close controls.
pub fn close_locator() -> Locator {
    Locator::any([
        Selector::tag("button").attr_contains_ci("aria-label", "close"),
        Selector::tag("button").attr_contains_ci("aria-label", "sluiten"),
        Selector::tag("button").and_class("close"),
        Selector::any().attr_eq("data-dismiss", "modal"),
        Selector::class("modal-close"),
    ])
}

/// Open the gallery, harvest while advancing, then close it again.
pub async fn traverse_gallery(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    set: &mut DiscoveredImageSet,
    timings: &Timings,
    max_attempts: usize,
) -> TraversalState {
    let mut state = TraversalState::new(max_attempts);
    let images = adapter.image_locator();

    let Some(main_image) = first_visible(page, &images, timings.gallery_open).await else {
        tracing::info!("No gallery image to open, continuing with page images");
        return state;
    };
    if let Err(e) = page.click(&main_image).await {
        tracing::info!("Could not open gallery overlay: {e}");
        return state;
    }
    page.wait(timings.gallery_open_settle).await;

    if first_visible(page, &modal_locator(), timings.gallery_open)
        .await
        .is_none()
    {
        tracing::info!("Gallery overlay did not open, continuing with page images");
        return state;
    }
    state.modal_open = true;
    state.has_next = true;
    tracing::info!("Gallery overlay opened");

    let next = next_locator();
    while state.should_continue() {
        state.attempts += 1;
        page.wait(timings.gallery_step_settle).await;

        state.harvested += harvest_visible(page, adapter, &images, set).await;

        match first_visible(page, &next, timings.gallery_next_probe).await {
            Some(button) => match page.click(&button).await {
                Ok(()) => page.wait(timings.gallery_step_settle).await,
                Err(e) => {
                    tracing::debug!("Next click failed: {e}");
                    state.has_next = false;
                }
            },
            None => state.has_next = false,
        }
    }

    tracing::info!(
        steps = state.attempts,
        harvested = state.harvested,
        "Navigated through gallery"
    );
    close_overlay(page, timings).await;
    state
}

async fn harvest_visible(
    page: &dyn PageDriver,
    adapter: &SiteAdapter,
    images: &Locator,
    set: &mut DiscoveredImageSet,
) -> usize {
    let Ok(handles) = page.query(images).await else {
        return 0;
    };
    let mut added = 0;
    for img in handles {
        if !matches!(page.is_visible(&img, std::time::Duration::ZERO).await, Ok(true)) {
            continue;
        }
        if let Ok(Some(src)) = page.attribute(&img, "src").await {
            if set.add(adapter, &src) {
                added += 1;
            }
        }
    }
    added
}

/// Click a close control, falling back to `Escape`. Failure is only logged.
async fn close_overlay(page: &dyn PageDriver, timings: &Timings) {
    if let Some(button) = first_visible(page, &close_locator(), timings.gallery_close_probe).await {
        if page.click(&button).await.is_ok() {
            page.wait(timings.gallery_step_settle).await;
            tracing::info!("Gallery overlay closed");
            return;
        }
    }
    match page.press_key("Escape").await {
        Ok(()) => {
            page.wait(timings.gallery_step_settle).await;
            tracing::info!("Gallery overlay closed with Escape key");
        }
        Err(e) => tracing::warn!("Could not close gallery overlay: {e}"),
    }
}
