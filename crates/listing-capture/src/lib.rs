//! listing-capture — site-adaptive image discovery and page capture for
//! classified-ad listing pages.
//!
//! One adapter-parameterised pipeline drives a browser page to a fully
//! expanded state, collects every product image URL it can find, enriches
//! them with `Last-Modified` metadata and captures the rendered page.

pub mod adapter;
pub mod config;
pub mod discovery;
pub mod enrich;
pub mod expand;
pub mod gallery;
pub mod output;
pub mod pipeline;
pub mod renderer;
pub mod session;
pub mod show_more;
pub mod types;
pub mod urlset;

pub use adapter::{SiteAdapter, SiteRegistry};
pub use config::{RunConfig, Timings};
pub use enrich::MetadataEnricher;
pub use pipeline::{run_in_browser, Pipeline};
pub use renderer::{ElementHandle, Locator, PageDriver, Renderer, Selector};
pub use types::*;
pub use urlset::{normalize, DiscoveredImageSet};
