//! Site adapters: declarative, per-site extraction settings.
//!
//! Everything that differs between listing sites lives here as data. The
//! pipeline itself never branches on the site id.

use regex::Regex;
use url::Url;

use crate::renderer::{Locator, Selector};
use crate::types::{CaptureError, CaptureResult};

/// Rule deriving a listing id from the listing URL.
#[derive(Debug, Clone)]
pub struct ListingIdRule {
    /// First capture group is the id. `None` always falls back.
    pattern: Option<Regex>,
    pub prefix: String,
    /// Used when the pattern does not match.
    pub fallback: String,
}

impl Default for ListingIdRule {
    fn default() -> Self {
        Self {
            pattern: None,
            prefix: String::new(),
            fallback: "listing".to_string(),
        }
    }
}

impl PartialEq for ListingIdRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.as_ref().map(Regex::as_str) == other.pattern.as_ref().map(Regex::as_str)
            && self.prefix == other.prefix
            && self.fallback == other.fallback
    }
}

impl Eq for ListingIdRule {}

impl ListingIdRule {
    /// Compile the rule. An invalid pattern is rejected here, not at match time.
    pub fn new(pattern: &str, prefix: &str, fallback: &str) -> CaptureResult<Self> {
        Ok(Self {
            pattern: Some(compile(pattern)?),
            prefix: prefix.to_string(),
            fallback: fallback.to_string(),
        })
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn extract(&self, url: &str) -> String {
        self.pattern
            .as_ref()
            .and_then(|re| capture_first(re, url))
            .map(|id| format!("{}{id}", self.prefix))
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// A secondary PDF published by the site next to the listing page.
#[derive(Debug, Clone)]
pub struct SecondaryAsset {
    /// First capture group feeds `{id}`.
    id_pattern: Regex,
    /// Path on the listing's origin, e.g. `/pdf/ins/{id}.nl.pdf`.
    pub path_template: String,
}

impl PartialEq for SecondaryAsset {
    fn eq(&self, other: &Self) -> bool {
        self.id_pattern.as_str() == other.id_pattern.as_str()
            && self.path_template == other.path_template
    }
}

impl Eq for SecondaryAsset {}

impl SecondaryAsset {
    pub fn new(id_pattern: &str, path_template: &str) -> CaptureResult<Self> {
        Ok(Self {
            id_pattern: compile(id_pattern)?,
            path_template: path_template.to_string(),
        })
    }

    pub fn id_pattern(&self) -> &str {
        self.id_pattern.as_str()
    }

    /// Absolute asset URL for a listing, if the id and origin resolve.
    pub fn resolve(&self, listing_url: &str) -> Option<String> {
        let id = capture_first(&self.id_pattern, listing_url)?;
        let origin = Url::parse(listing_url).ok()?.origin().ascii_serialization();
        if origin == "null" {
            return None;
        }
        Some(format!("{origin}{}", self.path_template.replace("{id}", &id)))
    }
}

fn compile(pattern: &str) -> CaptureResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| CaptureError::InvalidInput(format!("invalid adapter pattern {pattern:?}: {e}")))
}

fn capture_first(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Declarative description of one site's extraction behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAdapter {
    /// Short site identifier, also used as the output file suffix.
    pub id: String,
    /// Substrings identifying the site in a listing URL.
    pub site_patterns: Vec<String>,
    /// Substrings identifying the site's image assets.
    pub image_domains: Vec<String>,
    /// Cookie-banner accept controls, tried in order.
    pub cookie_selectors: Vec<Selector>,
    /// Collapsible section labels to expand, in order.
    pub section_labels: Vec<String>,
    /// "Show more" control families, tried in order.
    pub show_more_selectors: Vec<Selector>,
    /// A "show more" control is only activated if its text contains one of these.
    pub show_more_keywords: Vec<String>,
    pub listing_id: ListingIdRule,
    /// CSS injected before expanding truncated content.
    pub truncation_css: Option<String>,
    pub secondary_pdf: Option<SecondaryAsset>,
}

impl SiteAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            site_patterns: Vec::new(),
            image_domains: Vec::new(),
            cookie_selectors: Vec::new(),
            section_labels: Vec::new(),
            show_more_selectors: Vec::new(),
            show_more_keywords: Vec::new(),
            listing_id: ListingIdRule::default(),
            truncation_css: None,
            secondary_pdf: None,
        }
    }

    pub fn with_site_pattern(mut self, pattern: &str) -> Self {
        self.site_patterns.push(pattern.to_string());
        self
    }

    pub fn with_image_domain(mut self, domain: &str) -> Self {
        self.image_domains.push(domain.to_string());
        self
    }

    pub fn with_cookie_selector(mut self, selector: Selector) -> Self {
        self.cookie_selectors.push(selector);
        self
    }

    pub fn with_section(mut self, label: &str) -> Self {
        self.section_labels.push(label.to_string());
        self
    }

    pub fn with_show_more(mut self, selector: Selector) -> Self {
        self.show_more_selectors.push(selector);
        self
    }

    pub fn with_show_more_keyword(mut self, keyword: &str) -> Self {
        self.show_more_keywords.push(keyword.to_lowercase());
        self
    }

    pub fn with_listing_id(mut self, rule: ListingIdRule) -> Self {
        self.listing_id = rule;
        self
    }

    pub fn with_truncation_css(mut self, css: &str) -> Self {
        self.truncation_css = Some(css.to_string());
        self
    }

    pub fn with_secondary_pdf(mut self, asset: SecondaryAsset) -> Self {
        self.secondary_pdf = Some(asset);
        self
    }

    /// Whether this adapter handles the given listing URL.
    pub fn matches_site(&self, url: &str) -> bool {
        self.site_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// Whether a URL points at one of this site's image assets.
    pub fn matches_image(&self, url: &str) -> bool {
        self.image_domains.iter().any(|d| url.contains(d.as_str()))
    }

    /// Keyword predicate for "show more" control text. An adapter without
    /// keywords accepts any text.
    pub fn wants_show_more(&self, text: &str) -> bool {
        if self.show_more_keywords.is_empty() {
            return true;
        }
        let text = text.trim().to_lowercase();
        self.show_more_keywords
            .iter()
            .any(|k| text.contains(k.as_str()))
    }

    pub fn extract_listing_id(&self, url: &str) -> String {
        self.listing_id.extract(url)
    }

    /// `<img>` elements whose `src` points at the site's image domains.
    pub fn image_locator(&self) -> Locator {
        Locator::any(
            self.image_domains
                .iter()
                .map(|d| Selector::tag("img").attr_contains("src", d)),
        )
    }

    /// Elements carrying a matching `data-src` or `data-image` attribute.
    pub fn data_attr_locator(&self) -> Locator {
        Locator::any(self.image_domains.iter().flat_map(|d| {
            [
                Selector::any().attr_contains("data-src", d),
                Selector::any().attr_contains("data-image", d),
            ]
        }))
    }
}

/// botentekoop.nl listings (images served from boatsgroup.com).
pub fn botentekoop() -> SiteAdapter {
    SiteAdapter::new("botentekoop")
        .with_site_pattern("botentekoop.nl")
        .with_image_domain("boatsgroup.com")
        .with_cookie_selector(Selector::tag("button").with_text("Accept"))
        .with_cookie_selector(Selector::tag("button").with_text("Accepteren"))
        .with_cookie_selector(Selector::tag("button").with_text("Akkoord"))
        .with_cookie_selector(Selector::tag("button").attr_contains("id", "accept"))
        .with_cookie_selector(Selector::tag("button").attr_contains("class", "accept"))
        .with_cookie_selector(Selector::tag("a").with_text("Accept"))
        .with_cookie_selector(Selector::class("cookie-accept"))
        .with_cookie_selector(Selector::id("cookie-accept"))
        .with_section("Beschrijving")
        .with_section("Contactinformatie")
        .with_section("Meer informatie")
        .with_section("Kenmerken")
        .with_section("Voortstuwing")
        .with_section("Afmetingen")
        .with_show_more(
            Selector::tag("button").within(Selector::class("show-more-less-interaction")),
        )
        .with_show_more(
            Selector::tag("button")
                .within(Selector::tag("div").and_class("show-more-less-interaction")),
        )
        .with_show_more(Selector::tag("button").with_text("Meer weergeven"))
        .with_show_more(Selector::tag("button").with_text("Meer"))
        .with_show_more_keyword("meer")
        .with_show_more_keyword("weergeven")
        .with_listing_id(
            ListingIdRule::new(r"/boot/([^/]+)/?", "", "boat-listing")
                .expect("listing id regex is valid"),
        )
        .with_truncation_css(
            ".data-html-inner-wrapper { max-height: none !important; position: static !important; }",
        )
}

/// boat24.com listings (images on boat24.com / boat24.ch).
pub fn boat24() -> SiteAdapter {
    SiteAdapter::new("boat24")
        .with_site_pattern("boat24.com")
        .with_image_domain("boat24.com")
        .with_image_domain("boat24.ch")
        .with_cookie_selector(Selector::tag("button").with_text("Alles toestaan"))
        .with_cookie_selector(Selector::tag("button").with_text("Aanpassen"))
        .with_cookie_selector(Selector::tag("button").with_text("Accept"))
        .with_cookie_selector(Selector::tag("button").with_text("Accepteren"))
        .with_cookie_selector(Selector::tag("button").attr_contains("id", "accept"))
        .with_cookie_selector(Selector::tag("button").attr_contains("class", "accept"))
        .with_show_more(Selector::tag("button").with_text("Verder lezen"))
        .with_show_more(
            Selector::tag("button")
                .and_class("link")
                .with_text("Verder lezen"),
        )
        .with_show_more_keyword("verder")
        .with_show_more_keyword("lezen")
        .with_listing_id(
            ListingIdRule::new(r"/detail/(\d+)/?", "boat24-", "boat24-listing")
                .expect("listing id regex is valid"),
        )
        .with_secondary_pdf(
            SecondaryAsset::new(r"/detail/(\d+)/?", "/pdf/ins/{id}.nl.pdf")
                .expect("secondary asset regex is valid"),
        )
}

/// Ordered set of adapters; the first match wins.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    adapters: Vec<SiteAdapter>,
}

impl SiteRegistry {
    pub fn new(adapters: Vec<SiteAdapter>) -> Self {
        Self { adapters }
    }

    /// Registry of every built-in site.
    pub fn builtin() -> Self {
        Self::new(vec![botentekoop(), boat24()])
    }

    pub fn adapters(&self) -> &[SiteAdapter] {
        &self.adapters
    }

    /// Pick the adapter for a listing URL, in declaration order.
    pub fn resolve(&self, url: &str) -> CaptureResult<&SiteAdapter> {
        self.adapters
            .iter()
            .find(|a| a.matches_site(url))
            .ok_or_else(|| CaptureError::UnsupportedSite(url.to_string()))
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
