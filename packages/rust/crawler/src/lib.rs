//! Domain-scoped web crawler and page content extraction.
//!
//! This crate provides:
//! - [`engine`] — frontier-based crawler producing a [`CrawlResult`]
//! - [`scope`] — URL normalization and admission rules
//! - [`page`] — visible text, headings and links of a fetched page
//! - [`fetch`] — the [`PageFetcher`] seam and its `reqwest` implementation

pub mod engine;
pub mod fetch;
pub mod page;
pub mod scope;

pub use engine::{CrawlResult, Crawler};
pub use fetch::{HttpFetcher, PageFetcher};
pub use page::{Page, extract_page, truncate_chars};
pub use scope::{CrawlScope, normalize_str, normalize_url};
