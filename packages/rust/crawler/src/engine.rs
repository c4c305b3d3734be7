//! Frontier-based, domain-scoped web crawler engine.
//!
//! The crawler starts from a given URL and walks a FIFO frontier of
//! same-domain links, one fetch at a time, until the frontier is exhausted
//! or the page cap is reached.

use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use firmscope_shared::{CrawlConfig, CrawlSummary, PageSummary};

use crate::fetch::PageFetcher;
use crate::page::{Page, extract_page, truncate_chars};
use crate::scope::{CrawlScope, normalize_url};

/// Maximum title length kept in a crawl summary.
const SUMMARY_TITLE_CHARS: usize = 100;

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// Pages collected by one crawl, in visitation order.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    /// Visited pages. No two share a normalized URL.
    pub pages: Vec<Page>,
    /// Failed fetches (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Frontier entries skipped (already visited or not admitted).
    pub pages_skipped: usize,
    /// Total duration of the crawl.
    pub duration: Duration,
}

impl CrawlResult {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Render every page as one text block for the extractor.
    pub fn combined_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            let _ = write!(out, "\n\n=== PAGE: {} ===\n", page.url);
            let _ = writeln!(out, "TITLE: {}", page.title);
            if !page.meta_description.is_empty() {
                let _ = writeln!(out, "DESCRIPTION: {}", page.meta_description);
            }
            if !page.headings.is_empty() {
                let _ = writeln!(out, "HEADINGS: {}", page.headings.join(" | "));
            }
            let _ = writeln!(out, "CONTENT: {}", page.text);
        }
        out
    }

    /// Aggregate counts and per-page metadata.
    pub fn summary(&self) -> CrawlSummary {
        let pages: Vec<PageSummary> = self
            .pages
            .iter()
            .map(|p| PageSummary {
                url: p.url.clone(),
                title: truncate_chars(&p.title, SUMMARY_TITLE_CHARS),
                content_length: p.text.chars().count(),
                headings_count: p.headings.len(),
                links_count: p.links.len(),
            })
            .collect();

        CrawlSummary {
            total_pages: pages.len(),
            pages_with_content: pages.iter().filter(|p| p.content_length > 0).count(),
            total_content_length: pages.iter().map(|p| p.content_length).sum(),
            pages,
        }
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Single-site crawler. One fetch is in flight at a time.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
}

impl Crawler {
    pub fn new(config: CrawlConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Crawl from `start_url` with the configured page cap.
    pub async fn crawl(&self, start_url: &Url) -> CrawlResult {
        self.crawl_with_cap(start_url, self.config.max_pages).await
    }

    /// Crawl from `start_url`, visiting at most `cap` pages.
    ///
    /// Fetch failures are recorded and never abort the crawl. If the start
    /// URL itself fails, the result is empty.
    #[instrument(skip_all, fields(start_url = %start_url, cap = cap))]
    pub async fn crawl_with_cap(&self, start_url: &Url, cap: usize) -> CrawlResult {
        let start_time = Instant::now();
        let scope = CrawlScope::new(start_url, &self.config.exclude_patterns);
        let delay = Duration::from_millis(self.config.request_delay_ms);

        let mut frontier: VecDeque<Url> = VecDeque::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut result = CrawlResult::default();
        let mut attempted = false;

        let seed = normalize_url(start_url);
        if let Ok(seed_url) = Url::parse(&seed) {
            queued.insert(seed);
            frontier.push_back(seed_url);
        }

        info!(
            cap,
            request_delay_ms = self.config.request_delay_ms,
            "starting crawl"
        );

        while visited.len() < cap {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            let key = normalize_url(&url);

            if visited.contains(&key) {
                result.pages_skipped += 1;
                continue;
            }
            if !scope.admits(&url) {
                debug!(%url, "not admitted, skipping");
                result.pages_skipped += 1;
                continue;
            }

            if attempted && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempted = true;

            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(%url, error = %e, "page fetch failed");
                    result.errors.push((key, e.to_string()));
                    continue;
                }
            };

            let page = extract_page(&html, &url, self.config.max_content_length);
            visited.insert(key);

            for link in &page.links {
                if visited.contains(link) || queued.contains(link) {
                    continue;
                }
                let Ok(link_url) = Url::parse(link) else {
                    continue;
                };
                if scope.admits(&link_url) {
                    queued.insert(link.clone());
                    frontier.push_back(link_url);
                }
            }

            debug!(url = %page.url, links = page.links.len(), "page collected");
            result.pages.push(page);
        }

        result.duration = start_time.elapsed();

        info!(
            pages = result.pages.len(),
            pages_skipped = result.pages_skipped,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        result
    }
}

#[cfg(test)]
mod crawler_tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use firmscope_shared::{AppConfig, FirmScopeError, Result};

    use super::*;
    use crate::fetch::HttpFetcher;

    /// In-memory fetcher keyed by normalized URL.
    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    impl StaticFetcher {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.pages
                .get(&normalize_url(url))
                .cloned()
                .ok_or_else(|| FirmScopeError::Network(format!("{url}: HTTP 404 Not Found")))
        }
    }

    fn config(max_pages: usize) -> CrawlConfig {
        let mut config = CrawlConfig::from(&AppConfig::default());
        config.max_pages = max_pages;
        config.request_delay_ms = 0;
        config
    }

    const HOME: &str = r#"<html><head><title>Acme</title></head><body>
        <h1>Acme</h1>
        <a href="/about">About</a>
        <a href="/products">Products</a>
        <a href="/contact">Contact</a>
        <a href="/careers">Careers</a>
    </body></html>"#;

    fn leaf(title: &str) -> String {
        format!("<html><head><title>{title}</title></head><body><p>{title} page</p><a href=\"/\">Home</a></body></html>")
    }

    #[tokio::test]
    async fn cap_limits_visits_in_frontier_order() {
        let about = leaf("About");
        let products = leaf("Products");
        let contact = leaf("Contact");
        let fetcher = StaticFetcher::new(&[
            ("https://acme.example", HOME),
            ("https://acme.example/about", about.as_str()),
            ("https://acme.example/products", products.as_str()),
            ("https://acme.example/contact", contact.as_str()),
        ]);

        let crawler = Crawler::new(config(3), fetcher);
        let result = crawler
            .crawl(&Url::parse("https://acme.example").unwrap())
            .await;

        let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.example",
                "https://acme.example/about",
                "https://acme.example/products",
            ]
        );
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn denylisted_pages_are_never_fetched() {
        let about = leaf("About");
        let products = leaf("Products");
        let contact = leaf("Contact");
        let fetcher = StaticFetcher::new(&[
            ("https://acme.example", HOME),
            ("https://acme.example/about", about.as_str()),
            ("https://acme.example/products", products.as_str()),
            ("https://acme.example/contact", contact.as_str()),
            ("https://acme.example/careers", "<p>jobs</p>"),
        ]);

        let crawler = Crawler::new(config(10), fetcher);
        let result = crawler
            .crawl(&Url::parse("https://acme.example/").unwrap())
            .await;

        assert_eq!(result.pages.len(), 4);
        assert!(!result.pages.iter().any(|p| p.url.ends_with("/careers")));
        let unique: HashSet<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(unique.len(), result.pages.len());
    }

    #[tokio::test]
    async fn failed_start_yields_empty_result() {
        let fetcher = StaticFetcher::new(&[]);
        let crawler = Crawler::new(config(5), fetcher);
        let result = crawler
            .crawl(&Url::parse("https://down.example").unwrap())
            .await;

        assert!(result.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, "https://down.example");
        assert!(result.combined_text().is_empty());
    }

    #[tokio::test]
    async fn failed_page_is_recorded_and_crawl_continues() {
        let about = leaf("About");
        let fetcher = StaticFetcher::new(&[
            ("https://acme.example", HOME),
            ("https://acme.example/about", about.as_str()),
        ]);

        let crawler = Crawler::new(config(10), fetcher);
        let result = crawler
            .crawl(&Url::parse("https://acme.example").unwrap())
            .await;

        assert_eq!(result.pages.len(), 2);
        let failed: Vec<&str> = result.errors.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(
            failed,
            vec!["https://acme.example/products", "https://acme.example/contact"]
        );
    }

    #[test]
    fn combined_text_format() {
        let result = CrawlResult {
            pages: vec![Page {
                url: "https://acme.example".into(),
                title: "Acme".into(),
                text: "We build rails.".into(),
                headings: vec!["Welcome".into(), "Team".into()],
                meta_description: "Payments".into(),
                links: vec![],
            }],
            ..CrawlResult::default()
        };

        assert_eq!(
            result.combined_text(),
            "\n\n=== PAGE: https://acme.example ===\nTITLE: Acme\nDESCRIPTION: Payments\nHEADINGS: Welcome | Team\nCONTENT: We build rails.\n"
        );
    }

    #[test]
    fn summary_truncates_long_titles() {
        let result = CrawlResult {
            pages: vec![
                Page {
                    url: "https://acme.example".into(),
                    title: "x".repeat(150),
                    text: "abc".into(),
                    headings: vec!["h".into()],
                    meta_description: String::new(),
                    links: vec!["https://acme.example/about".into()],
                },
                Page {
                    url: "https://acme.example/empty".into(),
                    title: "Empty".into(),
                    text: String::new(),
                    headings: vec![],
                    meta_description: String::new(),
                    links: vec![],
                },
            ],
            ..CrawlResult::default()
        };

        let summary = result.summary();
        assert_eq!(summary.total_pages, 2);
        assert_eq!(summary.pages_with_content, 1);
        assert_eq!(summary.total_content_length, 3);
        assert_eq!(summary.pages[0].title.chars().count(), 103);
        assert!(summary.pages[0].title.ends_with("..."));
        assert_eq!(summary.pages[0].links_count, 1);
    }

    #[tokio::test]
    async fn test_crawl_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        let page1 = r#"<html><body>
            <main>
                <h1>Page One</h1>
                <p>Welcome to page one.</p>
                <a href="/page2">Go to page 2</a>
                <a href="/login">Sign in</a>
            </main>
        </body></html>"#;

        let page2 = r#"<html><body>
            <main>
                <h1>Page Two</h1>
                <p>This is page two.</p>
                <a href="/page3?utm=x">Go to page 3</a>
                <a href="/">Home</a>
            </main>
        </body></html>"#;

        let page3 = r#"<html><body>
            <main>
                <h1>Page Three</h1>
                <p>Final page.</p>
            </main>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page1))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/page2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page2))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/page3"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page3))
            .mount(&server)
            .await;

        let config = config(10);
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let crawler = Crawler::new(config, fetcher);
        let start_url = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&start_url).await;

        assert_eq!(result.pages.len(), 3);
        assert!(result.errors.is_empty());
        assert!(result.combined_text().contains("Final page."));
    }

    /// Records the paused-clock offset of every fetch.
    struct TimedFetcher {
        inner: Arc<StaticFetcher>,
        origin: tokio::time::Instant,
        offsets: std::sync::Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl PageFetcher for TimedFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.offsets.lock().unwrap().push(self.origin.elapsed());
            self.inner.fetch(url).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn request_delay_separates_fetches_but_not_the_first() {
        let about = leaf("About");
        let products = leaf("Products");
        let fetcher = Arc::new(TimedFetcher {
            inner: StaticFetcher::new(&[
                ("https://acme.example", HOME),
                ("https://acme.example/about", about.as_str()),
                ("https://acme.example/products", products.as_str()),
            ]),
            origin: tokio::time::Instant::now(),
            offsets: std::sync::Mutex::new(Vec::new()),
        });
        let mut config = config(3);
        config.request_delay_ms = 500;

        let crawler = Crawler::new(config, fetcher.clone());
        let result = crawler
            .crawl(&Url::parse("https://acme.example").unwrap())
            .await;

        assert_eq!(result.pages.len(), 3);
        let offsets = fetcher.offsets.lock().unwrap().clone();
        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets[0], Duration::ZERO);
        for pair in offsets.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(500), "gap {gap:?}");
            assert!(gap < Duration::from_millis(600), "gap {gap:?}");
        }
    }
}
