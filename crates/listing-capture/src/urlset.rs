//! Canonical image URLs and the deduplicated discovery set.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::adapter::SiteAdapter;

/// Strip everything from the first `?` onward.
///
/// Asset URLs that differ only by resize/quality parameters identify the
/// same image.
pub fn normalize(raw: &str) -> &str {
    match raw.find('?') {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// Final path segment of a URL (the whole string if it has no `/`).
pub fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Candidate URLs of a `srcset` attribute, descriptors dropped.
pub fn parse_srcset(value: &str) -> Vec<&str> {
    value
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .collect()
}

/// First `url(...)` target of an inline style, quotes removed.
pub fn background_image_url(style: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"url\(['"]?([^'"]+)['"]?\)"#).expect("background url regex is valid")
    });
    re.captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Order-irrelevant set of canonical image URLs.
///
/// Grows monotonically; iteration is always lexicographic ascending so the
/// serialized output does not depend on discovery order. Inserts take
/// `&mut self`, so concurrent discovery has to serialize through a lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredImageSet {
    urls: BTreeSet<String>,
}

impl DiscoveredImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the canonical form of `raw` if it matches the adapter's image
    /// predicate. Returns `true` when a new entry was added.
    pub fn add(&mut self, adapter: &SiteAdapter, raw: &str) -> bool {
        let canonical = normalize(raw.trim());
        if canonical.is_empty() || !adapter.matches_image(canonical) {
            return false;
        }
        self.urls.insert(canonical.to_string())
    }

    /// Insert every URL of an iterator, returning how many were new.
    pub fn extend<'a>(
        &mut self,
        adapter: &SiteAdapter,
        raws: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        raws.into_iter()
            .filter(|raw| self.add(adapter, raw))
            .count()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Canonical URLs in ascending order.
    pub fn sorted(&self) -> Vec<String> {
        self.urls.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}
