//! Content extraction from fetched HTML.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::scope::normalize_url;

/// Subtrees that never contribute visible page text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "noscript"];

/// Marker appended to truncated text.
const TRUNCATION_MARKER: &str = "...";

/// A crawled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Normalized URL, unique within a crawl.
    pub url: String,
    pub title: String,
    /// Visible text, whitespace-collapsed and length-capped.
    pub text: String,
    /// h1–h6 text in document order.
    pub headings: Vec<String>,
    pub meta_description: String,
    /// Outbound normalized http(s) URLs in first-seen order.
    pub links: Vec<String>,
}

/// Extract a [`Page`] from an HTML document fetched from `url`.
pub fn extract_page(html: &str, url: &Url, max_chars: usize) -> Page {
    let doc = Html::parse_document(html);

    Page {
        url: normalize_url(url),
        title: extract_title(&doc),
        text: extract_text(&doc, max_chars),
        headings: extract_headings(&doc),
        meta_description: extract_meta_description(&doc),
        links: extract_links(&doc, url),
    }
}

fn extract_title(doc: &Html) -> String {
    let sel = Selector::parse("title").unwrap();
    doc.select(&sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn extract_text(doc: &Html, max_chars: usize) -> String {
    let mut raw = String::new();
    collect_text(doc.root_element(), &mut raw);
    truncate_chars(&collapse_whitespace(&raw), max_chars)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) if !SKIPPED_ELEMENTS.contains(&element.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn extract_headings(doc: &Html) -> Vec<String> {
    let sel = Selector::parse("h1, h2, h3, h4, h5, h6").unwrap();
    doc.select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|h| !h.is_empty())
        .collect()
}

fn extract_meta_description(doc: &Html) -> String {
    let sel = Selector::parse(r#"meta[name="description"]"#).unwrap();
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}

/// Extract all links from a document, resolved against the base URL and normalized.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").unwrap();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };

        // Skip anchors, javascript:, mailto:, tel:
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }

        let normalized = normalize_url(&resolved);
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }

    links
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap `s` at `max_chars` characters, appending the truncation marker when cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{TRUNCATION_MARKER}", &s[..idx]),
        None => s.to_string(),
    }
}
