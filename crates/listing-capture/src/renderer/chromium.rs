//! Chromium-based renderer using chromiumoxide.
//!
//! Element handles are realised by stamping matched nodes with a
//! `data-lc-handle` attribute from the query script; later operations look
//! the node up again by that attribute, so a node that was re-rendered away
//! surfaces as [`DriverError::StaleElement`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, PrintToPdfParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{ElementHandle, Locator, NavigationResult, PageDriver, PdfOptions, Renderer, Selector};
use crate::types::DriverError;

/// Attribute used to pin queried elements.
const HANDLE_ATTR: &str = "data-lc-handle";

/// Interval between visibility checks.
const VISIBILITY_POLL: Duration = Duration::from_millis(100);

/// Env var naming an explicit Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "LISTING_CAPTURE_CHROMIUM_PATH";

/// Resolve every selector of a locator, dedupe, sort in document order and
/// stamp each node with a handle id.
const QUERY_JS: &str = r#"(function(specs) {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const select = (spec) => {
    const roots = spec.within ? select(spec.within) : [document];
    const out = [];
    for (const root of roots) {
      let nodes = [];
      try { nodes = root.querySelectorAll(spec.css); } catch (e) { nodes = []; }
      for (const el of nodes) {
        if (spec.text != null && !norm(el.textContent).includes(norm(spec.text))) continue;
        if (!out.includes(el)) out.push(el);
      }
    }
    return out;
  };
  const seen = new Set();
  for (const spec of specs) for (const el of select(spec)) seen.add(el);
  const all = Array.from(seen);
  all.sort((a, b) => a === b ? 0 :
    (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1);
  window.__lcNextHandle = window.__lcNextHandle || 0;
  return all.map((el) => {
    let id = el.getAttribute('data-lc-handle');
    if (!id) {
      window.__lcNextHandle += 1;
      id = String(window.__lcNextHandle);
      el.setAttribute('data-lc-handle', id);
    }
    return id;
  });
})"#;

/// Per-element read: attribute, text and visibility in one round trip.
const INSPECT_JS: &str = r#"(function(id, attr) {
  const el = document.querySelector('[data-lc-handle="' + id + '"]');
  if (!el || !el.isConnected) return { stale: true };
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  const visible = rect.width > 0 && rect.height > 0 &&
    style.visibility !== 'hidden' && style.display !== 'none';
  return {
    stale: false,
    visible: visible,
    text: el.textContent || '',
    value: attr == null ? null : el.getAttribute(attr),
  };
})"#;

const STYLE_JS: &str = r#"(function(css) {
  const style = document.createElement('style');
  style.setAttribute('data-listing-capture', '');
  style.textContent = css;
  (document.head || document.documentElement).appendChild(style);
  return true;
})"#;

/// JSON payload handed to `QUERY_JS`.
#[derive(Debug, Serialize)]
struct QuerySpec {
    css: String,
    text: Option<String>,
    within: Option<Box<QuerySpec>>,
}

impl From<&Selector> for QuerySpec {
    fn from(selector: &Selector) -> Self {
        Self {
            css: selector.to_css(),
            text: selector.text.clone(),
            within: selector.within.as_deref().map(|s| Box::new(QuerySpec::from(s))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ElementState {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    value: Option<String>,
}

/// Browser launch settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chromium_path: None,
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Explicit path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 2. LISTING_CAPTURE_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.cache/listing-capture/chromium/
    if let Some(home) = dirs::home_dir() {
        let base = home.join(".cache/listing-capture/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                base.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome"),
            ]
        } else {
            vec![base.join("chrome-linux64/chrome"), base.join("chrome")]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, DriverError> {
        let chrome_path = find_chromium(options.chromium_path.as_deref()).ok_or_else(|| {
            DriverError::Backend(format!(
                "Chromium not found; pass --chromium or set {CHROMIUM_PATH_ENV}"
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(options.viewport_width, options.viewport_height)
            .viewport(Viewport {
                width: options.viewport_width,
                height: options.viewport_height,
                ..Viewport::default()
            })
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        builder = if options.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| DriverError::Backend(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Backend(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {e}");
                }
            }
        });

        tracing::info!(headless = options.headless, "Chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Backend(format!("failed to create new page: {e}")))?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumPage {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Backend(format!("failed to close browser: {e}")));
        let _ = browser.wait().await;
        self.handler.abort();
        closed
    }

    fn active_pages(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Backend(format!("JS execution failed: {e}")))?;
        result
            .into_value()
            .map_err(|e| DriverError::Backend(format!("failed to convert JS result: {e:?}")))
    }

    async fn inspect(
        &self,
        el: &ElementHandle,
        attr: Option<&str>,
    ) -> Result<ElementState, DriverError> {
        let script = format!("{INSPECT_JS}({}, {})", js_literal(el.id()), js_literal(&attr));
        let state: ElementState = self.eval(script).await?;
        if state.stale {
            return Err(DriverError::StaleElement);
        }
        Ok(state)
    }
}

fn js_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, DriverError> {
        let start = Instant::now();

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(DriverError::Backend(format!("navigation failed: {e}"))),
            Err(_) => Err(DriverError::Timeout(timeout)),
        }
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        if locator.is_empty() {
            return Ok(Vec::new());
        }
        let specs: Vec<QuerySpec> = locator.any_of.iter().map(QuerySpec::from).collect();
        let script = format!("{QUERY_JS}({})", js_literal(&specs));
        let ids: Vec<String> = self.eval(script).await?;
        Ok(ids.into_iter().map(ElementHandle::new).collect())
    }

    async fn attribute(
        &self,
        el: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.inspect(el, Some(name)).await?.value)
    }

    async fn text(&self, el: &ElementHandle) -> Result<String, DriverError> {
        Ok(self.inspect(el, None).await?.text)
    }

    async fn is_visible(&self, el: &ElementHandle, timeout: Duration) -> Result<bool, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.inspect(el, None).await?.visible {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(VISIBILITY_POLL).await;
        }
    }

    async fn click(&self, el: &ElementHandle) -> Result<(), DriverError> {
        // Only a detached node is stale; lookup errors are backend failures.
        self.inspect(el, None).await?;
        let css = format!("[{HANDLE_ATTR}=\"{}\"]", el.id());
        let element = self
            .page
            .find_element(css)
            .await
            .map_err(|e| DriverError::Backend(format!("element lookup failed: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Backend(format!("click failed: {e}")))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), DriverError> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| DriverError::Backend(format!("no document body: {e}")))?;
        body.press_key(key)
            .await
            .map_err(|e| DriverError::Backend(format!("key press failed: {e}")))?;
        Ok(())
    }

    async fn add_style(&self, css: &str) -> Result<(), DriverError> {
        let script = format!("{STYLE_JS}({})", js_literal(css));
        let _: bool = self.eval(script).await?;
        Ok(())
    }

    async fn emulate_screen_media(&self) -> Result<(), DriverError> {
        self.page
            .execute(SetEmulatedMediaParams::builder().media("screen").build())
            .await
            .map_err(|e| DriverError::Backend(format!("media emulation failed: {e}")))?;
        Ok(())
    }

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, DriverError> {
        let params = PrintToPdfParams::builder()
            .paper_width(options.paper_width)
            .paper_height(options.paper_height)
            .margin_top(options.margin)
            .margin_bottom(options.margin)
            .margin_left(options.margin)
            .margin_right(options.margin)
            .print_background(options.print_background)
            .prefer_css_page_size(false)
            .build();
        self.page
            .pdf(params)
            .await
            .map_err(|e| DriverError::Backend(format!("failed to generate PDF: {e}")))
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| DriverError::Backend(format!("failed to capture screenshot: {e}")))
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page
            .close()
            .await
            .map_err(|e| DriverError::Backend(format!("failed to close page: {e}")))
    }
}
