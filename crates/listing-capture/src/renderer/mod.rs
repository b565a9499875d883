//! Page capability abstraction.
//!
//! Defines the `Renderer` and `PageDriver` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide), and the small
//! typed selector language every backend has to understand: tag, class and
//! id matches, attribute presence/equality/substring filters, a
//! text-contains filter and an optional ancestor scope.

pub mod chromium;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::DriverError;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Opaque reference to an element found by [`PageDriver::query`].
///
/// Handles may go stale when the page re-renders; operations on a stale
/// handle fail with [`DriverError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// How an attribute filter compares values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttrOp {
    Present,
    Equals(String),
    Contains(String),
}

/// One attribute condition of a [`Selector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrFilter {
    pub name: String,
    pub op: AttrOp,
    #[serde(default)]
    pub ignore_case: bool,
}

impl AttrFilter {
    /// Test an attribute value (`None` when the attribute is absent).
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let fold = |s: &str| {
            if self.ignore_case {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        match &self.op {
            AttrOp::Present => true,
            AttrOp::Equals(expected) => fold(value) == fold(expected),
            AttrOp::Contains(needle) => fold(value).contains(&fold(needle)),
        }
    }
}

/// A single element selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub tag: Option<String>,
    pub class: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub attrs: Vec<AttrFilter>,
    /// Case-insensitive, whitespace-normalised text-contains filter.
    pub text: Option<String>,
    /// Restrict matches to descendants of elements matching this selector.
    pub within: Option<Box<Selector>>,
}

impl Selector {
    /// Match any element (further narrowed by filters).
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn class(class: &str) -> Self {
        Self::any().and_class(class)
    }

    pub fn id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn and_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str) -> Self {
        self.attrs.push(AttrFilter {
            name: name.to_string(),
            op: AttrOp::Present,
            ignore_case: false,
        });
        self
    }

    pub fn attr_eq(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrFilter {
            name: name.to_string(),
            op: AttrOp::Equals(value.to_string()),
            ignore_case: false,
        });
        self
    }

    pub fn attr_contains(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrFilter {
            name: name.to_string(),
            op: AttrOp::Contains(value.to_string()),
            ignore_case: false,
        });
        self
    }

    /// Case-insensitive substring match on an attribute value.
    pub fn attr_contains_ci(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrFilter {
            name: name.to_string(),
            op: AttrOp::Contains(value.to_string()),
            ignore_case: true,
        });
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn within(mut self, ancestor: Selector) -> Self {
        self.within = Some(Box::new(ancestor));
        self
    }

    /// CSS rendering of the tag/class/id/attribute part (no text, no scope).
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        if let Some(tag) = &self.tag {
            css.push_str(tag);
        }
        if let Some(id) = &self.id {
            css.push('#');
            css.push_str(&css_ident(id));
        }
        if let Some(class) = &self.class {
            css.push('.');
            css.push_str(&css_ident(class));
        }
        for attr in &self.attrs {
            let flag = if attr.ignore_case { " i" } else { "" };
            match &attr.op {
                AttrOp::Present => css.push_str(&format!("[{}]", attr.name)),
                AttrOp::Equals(v) => {
                    css.push_str(&format!("[{}=\"{}\"{flag}]", attr.name, css_string(v)))
                }
                AttrOp::Contains(v) => {
                    css.push_str(&format!("[{}*=\"{}\"{flag}]", attr.name, css_string(v)))
                }
            }
        }
        if css.is_empty() {
            css.push('*');
        }
        css
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.within {
            write!(f, "{scope} ")?;
        }
        f.write_str(&self.to_css())?;
        if let Some(text) = &self.text {
            write!(f, ":has-text(\"{text}\")")?;
        }
        Ok(())
    }
}

/// A union of selectors; matches are returned in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub any_of: Vec<Selector>,
}

impl Locator {
    pub fn any(selectors: impl IntoIterator<Item = Selector>) -> Self {
        Self {
            any_of: selectors.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self {
            any_of: vec![selector],
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.any_of.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

/// Whitespace-normalised, case-insensitive containment used by text filters.
pub fn text_contains(haystack: &str, needle: &str) -> bool {
    let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    squash(haystack).contains(&squash(needle))
}

fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn css_ident(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_string()
            } else {
                format!("\\{c}")
            }
        })
        .collect()
}

/// PDF rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfOptions {
    /// Paper width in inches.
    pub paper_width: f64,
    /// Paper height in inches.
    pub paper_height: f64,
    /// Uniform margin in inches.
    pub margin: f64,
    pub print_background: bool,
}

impl Default for PdfOptions {
    /// A4 with 20px (at 96 dpi) margins and backgrounds.
    fn default() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            margin: 20.0 / 96.0,
            print_background: true,
        }
    }
}

/// A browser engine that can open pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new page (tab).
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, DriverError>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<(), DriverError>;
    /// Number of currently open pages.
    fn active_pages(&self) -> usize;
}

/// A single browser page.
///
/// Every call is an awaited, time-bounded operation. Callers treat an
/// elapsed bounded wait as "absent" rather than as a failure.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<NavigationResult, DriverError>;
    /// All elements matching the locator, in document order.
    async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError>;
    /// Read an attribute (`None` when absent).
    async fn attribute(&self, el: &ElementHandle, name: &str)
        -> Result<Option<String>, DriverError>;
    /// Text content of an element.
    async fn text(&self, el: &ElementHandle) -> Result<String, DriverError>;
    /// Poll until the element is visible or the timeout elapses.
    async fn is_visible(&self, el: &ElementHandle, timeout: Duration)
        -> Result<bool, DriverError>;
    async fn click(&self, el: &ElementHandle) -> Result<(), DriverError>;
    /// Dispatch a key press (e.g. `"Escape"`) to the page.
    async fn press_key(&self, key: &str) -> Result<(), DriverError>;
    /// Inject a `<style>` tag with the given CSS.
    async fn add_style(&self, css: &str) -> Result<(), DriverError>;
    /// Fixed settle delay.
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
    /// Render with screen media so print stylesheets do not hide content.
    async fn emulate_screen_media(&self) -> Result<(), DriverError>;
    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, DriverError>;
    /// PNG screenshot.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, DriverError>;
    /// Close this page.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// First element of `locator` that becomes visible within `timeout`.
///
/// Stale handles and failed checks count as "not visible".
pub async fn first_visible(
    page: &dyn PageDriver,
    locator: &Locator,
    timeout: Duration,
) -> Option<ElementHandle> {
    let first = page.query(locator).await.ok()?.into_iter().next()?;
    match page.is_visible(&first, timeout).await {
        Ok(true) => Some(first),
        _ => None,
    }
}
