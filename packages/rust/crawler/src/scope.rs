//! URL normalization and crawl admission rules.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Path segments that never carry company information.
static DENIED_SEGMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/(careers|jobs|support|help|faq|privacy|terms|legal|sitemap|search|login|register|account)(/|$)",
    )
    .expect("valid regex")
});

/// Binary documents and images.
static DENIED_FILES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(pdf|doc|jpg|png|gif)$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a URL for deduplication.
///
/// Drops the query string and fragment and strips trailing slashes from the
/// path. Scheme, host, port and the rest of the path are kept. Applying it
/// twice yields the same string.
pub fn normalize_url(url: &Url) -> String {
    let origin = &url[..url::Position::BeforePath];
    format!("{origin}{}", url.path().trim_end_matches('/'))
}

/// Parse and normalize a raw URL string.
pub fn normalize_str(raw: &str) -> Option<String> {
    Url::parse(raw).ok().map(|u| normalize_url(&u))
}

// ---------------------------------------------------------------------------
// Scope checking
// ---------------------------------------------------------------------------

/// Decides which URLs a crawl may visit.
#[derive(Debug)]
pub struct CrawlScope {
    /// Lowercased host of the start URL.
    base_host: String,
    base_port: Option<u16>,
    /// User-configured exclude globs, matched against the path.
    exclude_patterns: Vec<Regex>,
}

impl CrawlScope {
    pub fn new(start_url: &Url, exclude_patterns: &[String]) -> Self {
        let base_host = start_url.host_str().unwrap_or("").to_ascii_lowercase();

        let exclude_patterns = exclude_patterns
            .iter()
            .filter_map(|p| glob_to_regex(p))
            .collect();

        Self {
            base_host,
            base_port: start_url.port_or_known_default(),
            exclude_patterns,
        }
    }

    /// Whether `url` may be fetched.
    pub fn admits(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let host = url.host_str().unwrap_or("");
        if !host.eq_ignore_ascii_case(&self.base_host)
            || url.port_or_known_default() != self.base_port
        {
            return false;
        }

        let path = url.path();
        if DENIED_SEGMENTS.is_match(path) || DENIED_FILES.is_match(path) {
            return false;
        }

        !self.exclude_patterns.iter().any(|p| p.is_match(path))
    }
}

/// Convert a glob-like pattern to a regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn normalize_strips_query_fragment_and_slash() {
        assert_eq!(
            normalize_url(&url("https://acme.example/about/?ref=nav#team")),
            "https://acme.example/about"
        );
        assert_eq!(
            normalize_url(&url("https://acme.example/")),
            "https://acme.example"
        );
        assert_eq!(
            normalize_url(&url("http://acme.example:8080/a//")),
            "http://acme.example:8080/a"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "https://acme.example",
            "https://acme.example/",
            "https://acme.example/products/?page=2",
            "https://ACME.example/About#x",
            "http://127.0.0.1:4000/contact/",
        ] {
            let once = normalize_str(raw).unwrap();
            let twice = normalize_str(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn scope_same_host_only() {
        let scope = CrawlScope::new(&url("https://acme.example/"), &[]);
        assert!(scope.admits(&url("https://acme.example/about")));
        assert!(scope.admits(&url("https://ACME.EXAMPLE/products")));
        assert!(!scope.admits(&url("https://other.example/about")));
        assert!(!scope.admits(&url("https://acme.example:8443/about")));
        assert!(!scope.admits(&url("ftp://acme.example/file")));
    }

    #[test]
    fn scope_rejects_denylist() {
        let scope = CrawlScope::new(&url("https://acme.example/"), &[]);
        assert!(!scope.admits(&url("https://acme.example/careers")));
        assert!(!scope.admits(&url("https://acme.example/en/jobs/open")));
        assert!(!scope.admits(&url("https://acme.example/Privacy")));
        assert!(!scope.admits(&url("https://acme.example/brochure.pdf")));
        assert!(!scope.admits(&url("https://acme.example/logo.PNG")));
        // Segment match only, not substring.
        assert!(scope.admits(&url("https://acme.example/helpers-and-tools")));
        assert!(scope.admits(&url("https://acme.example/research")));
    }

    #[test]
    fn scope_excludes_globs() {
        let scope = CrawlScope::new(&url("https://acme.example/"), &["/blog/**".into()]);
        assert!(!scope.admits(&url("https://acme.example/blog/post-1")));
        assert!(scope.admits(&url("https://acme.example/products")));
    }
}
