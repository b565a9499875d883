//! One capture run, end to end.

use chrono::{NaiveDate, Utc};

use crate::adapter::{SiteAdapter, SiteRegistry};
use crate::config::RunConfig;
use crate::discovery::{discover_images, wait_for_first_image};
use crate::enrich::{build_client, MetadataEnricher};
use crate::expand::expand_sections;
use crate::output::{self, CaptureToggles};
use crate::renderer::{PageDriver, Renderer};
use crate::session::bootstrap;
use crate::show_more::expand_truncated;
use crate::types::{CaptureError, CaptureResult, RunSummary};

/// Adapter-parameterised capture pipeline.
///
/// The same sequence runs for every site: bootstrap, section expansion,
/// truncation removal, discovery, enrichment, listing files, page capture
/// and the optional secondary asset.
pub struct Pipeline {
    config: RunConfig,
    registry: SiteRegistry,
    client: Option<reqwest::Client>,
    date: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            registry: SiteRegistry::builtin(),
            client: None,
            date: None,
        }
    }

    pub fn with_registry(mut self, registry: SiteRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a prepared HTTP client instead of building one per run.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Fix the date used in artifact names (defaults to today, UTC).
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The adapter handling this run's URL.
    pub fn adapter(&self) -> CaptureResult<&SiteAdapter> {
        self.registry.resolve(&self.config.url)
    }

    /// Drive `page` through the full capture sequence.
    pub async fn run(&self, page: &mut dyn PageDriver) -> CaptureResult<RunSummary> {
        let config = &self.config;
        let timings = &config.timings;
        let adapter = self.adapter()?;
        let listing_id = adapter.extract_listing_id(&config.url);

        let mut summary = RunSummary {
            site: adapter.id.clone(),
            listing_id: listing_id.clone(),
            url: config.url.clone(),
            images_skipped: config.skip_images,
            ..RunSummary::default()
        };

        let boot = bootstrap(page, adapter, &config.url, timings).await?;
        summary.cookie_banner_dismissed = boot.cookie_selector.is_some();

        let page: &dyn PageDriver = page;

        let sections = expand_sections(page, &adapter.section_labels, timings).await;
        summary.sections_expanded = sections.expanded();
        summary.sections_already_open = sections.already_open();
        summary.sections_not_found = sections.not_found();

        let show_more = expand_truncated(page, adapter, timings).await;
        summary.buttons_clicked = show_more.clicked;

        let client = match &self.client {
            Some(client) => client.clone(),
            None => build_client(timings.head_timeout)?,
        };

        if config.skip_images {
            tracing::info!("Skipped image extraction");
        } else {
            if !wait_for_first_image(page, adapter, timings.image_wait).await {
                tracing::warn!(
                    wait = ?timings.image_wait,
                    "No matching image appeared, continuing"
                );
            }
            let discovery =
                discover_images(page, adapter, timings, config.max_gallery_attempts).await;
            summary.gallery_steps = discovery.gallery.attempts;
            summary.images_found = discovery.urls.len();
            tracing::info!(total = discovery.urls.len(), "Total unique images found");

            let enricher = MetadataEnricher::with_client(client.clone(), config.enrich_concurrency);
            let records = enricher.enrich(&discovery.urls).await;
            let (dated, only) =
                output::write_listings(&config.output_dir, &adapter.id, &records, &discovery.urls)?;
            summary.outputs.dated_listing = Some(dated);
            summary.outputs.url_listing = Some(only);
            summary.records = records;
        }

        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        let base = output::artifact_base(&listing_id, date, &adapter.id);
        let toggles = CaptureToggles {
            pdf: config.capture_pdf,
            screenshot: config.capture_screenshot,
        };
        let (pdf, png) = output::capture_page(page, &config.output_dir, &base, toggles).await?;
        summary.outputs.pdf = pdf;
        summary.outputs.screenshot = png;

        if let Some(asset) = &adapter.secondary_pdf {
            match asset.resolve(&config.url) {
                Some(asset_url) => {
                    let dest = config.output_dir.join(format!("{base}_original.pdf"));
                    summary.outputs.original_pdf =
                        output::download_asset(&client, &asset_url, &dest, timings.asset_timeout)
                            .await?;
                }
                None => tracing::info!("Could not derive original PDF URL from listing URL"),
            }
        }

        Ok(summary)
    }
}

/// Run a pipeline on a fresh page and release the browser on every path.
///
/// The run result is computed first, then the page and the renderer are
/// closed, then the result is returned.
pub async fn run_in_browser(
    renderer: &dyn Renderer,
    pipeline: &Pipeline,
) -> CaptureResult<RunSummary> {
    let mut page = match renderer.new_page().await {
        Ok(page) => page,
        Err(e) => {
            if let Err(e) = renderer.shutdown().await {
                tracing::warn!("Browser shutdown failed: {e}");
            }
            return Err(CaptureError::BrowserUnavailable(e.to_string()));
        }
    };

    let result = pipeline.run(page.as_mut()).await;

    if let Err(e) = page.close().await {
        tracing::debug!("Page close failed: {e}");
    }
    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("Browser shutdown failed: {e}");
    }
    tracing::info!("Browser closed");

    result
}
