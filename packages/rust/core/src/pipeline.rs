//! Single-URL pipeline: crawl → extract → reconcile → validate → persist.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use url::Url;

use firmscope_crawler::{CrawlResult, Crawler, PageFetcher};
use firmscope_shared::{
    BatchConfig, CrawlConfig, FirmScopeError, ProcessingResult, Result, StructuredRecord,
};
use firmscope_taxonomy::{Taxonomy, validate_record};

use crate::extraction::Extractor;
use crate::history::ResultHistory;
use crate::persist::ResultSink;
use crate::reconcile::{Reconciled, reconcile};

/// Marker appended when the extractor input is cut to fit the budget.
const TRUNCATION_MARKER: &str = "\n\n[... content truncated for LLM context window ...]";

/// Runs the pipeline for single URLs and batches.
///
/// The orchestrator owns a pool of extractors (used round-robin by the
/// parallel batch mode), the shared vocabulary and the result sink. Every
/// run gets its own [`Crawler`].
pub struct Orchestrator {
    crawl: CrawlConfig,
    pub(crate) batch: BatchConfig,
    fetcher: Arc<dyn PageFetcher>,
    taxonomy: Arc<Taxonomy>,
    extractors: Vec<Arc<dyn Extractor>>,
    sink: Arc<dyn ResultSink>,
    history: Mutex<ResultHistory>,
}

impl Orchestrator {
    /// Create an orchestrator. `extractors` must not be empty.
    pub fn new(
        crawl: CrawlConfig,
        batch: BatchConfig,
        fetcher: Arc<dyn PageFetcher>,
        taxonomy: Arc<Taxonomy>,
        extractors: Vec<Arc<dyn Extractor>>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self> {
        if extractors.is_empty() {
            return Err(FirmScopeError::config("at least one extractor is required"));
        }
        if taxonomy.is_empty() {
            warn!("sector vocabulary is empty; every categorical field will be flagged");
        }

        let history = Mutex::new(ResultHistory::new(batch.history_capacity));
        Ok(Self {
            crawl,
            batch,
            fetcher,
            taxonomy,
            extractors,
            sink,
            history,
        })
    }

    /// Process one URL with the first extractor of the pool.
    pub async fn process_url(&self, url: &str) -> ProcessingResult {
        let extractor = self.extractor(0);
        self.process_with(url, extractor.as_ref()).await
    }

    /// Process one URL with the given extractor.
    ///
    /// Never fails: pipeline errors become a failed [`ProcessingResult`].
    /// The result is persisted (failures are logged) and appended to the
    /// history before it is returned.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn process_with(&self, url: &str, extractor: &dyn Extractor) -> ProcessingResult {
        let started_at = Utc::now();
        let started = Instant::now();

        let outcome = match self.crawl_site(url).await {
            Err(e) => Err((e, None)),
            Ok(crawl) => {
                let summary = crawl.summary();
                let extracted = match ensure_content(url, &crawl) {
                    Ok(()) => self.extract_record(&crawl, extractor).await,
                    Err(e) => Err(e),
                };
                match extracted {
                    Ok(record) => Ok((record, summary)),
                    Err(e) => Err((e, Some(summary))),
                }
            }
        };

        let result = match outcome {
            Ok((record, summary)) => {
                ProcessingResult::succeeded(url, record, summary, started.elapsed())
                    .started_at(started_at)
            }
            Err((e, summary)) => {
                warn!(error = %e, "processing failed");
                ProcessingResult::failed(
                    url,
                    format!("Error processing {url}: {e}"),
                    summary,
                    started.elapsed(),
                )
                .started_at(started_at)
            }
        };

        info!(
            success = result.is_success(),
            pages = result.pages_crawled(),
            secs = result.processing_time_secs(),
            "processing finished"
        );
        self.record(result).await
    }

    /// Persist a result and append it to the history.
    pub(crate) async fn record(&self, result: ProcessingResult) -> ProcessingResult {
        if let Err(e) = self.sink.persist(&result).await {
            error!(url = %result.url(), error = %e, "failed to persist processing result");
        }
        self.history.lock().await.push(result.clone());
        result
    }

    pub(crate) fn extractor(&self, index: usize) -> Arc<dyn Extractor> {
        Arc::clone(&self.extractors[index % self.extractors.len()])
    }

    pub fn extractor_count(&self) -> usize {
        self.extractors.len()
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Retained results, oldest first.
    pub async fn history(&self) -> Vec<ProcessingResult> {
        self.history.lock().await.list()
    }

    pub async fn latest(&self) -> Option<ProcessingResult> {
        self.history.lock().await.latest().cloned()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn crawl_site(&self, url: &str) -> Result<CrawlResult> {
        let start_url = parse_start_url(url)?;

        let crawler = Crawler::new(self.crawl.clone(), Arc::clone(&self.fetcher));
        Ok(crawler.crawl(&start_url).await)
    }

    async fn extract_record(
        &self,
        crawl: &CrawlResult,
        extractor: &dyn Extractor,
    ) -> Result<StructuredRecord> {
        let text = truncate_input(&crawl.combined_text(), self.batch.max_input_chars);

        let raw = extractor.extract(&text).await.map_err(|e| match e {
            FirmScopeError::Extraction(_) => e,
            other => FirmScopeError::Extraction(other.to_string()),
        })?;
        if raw.trim().is_empty() {
            return Err(FirmScopeError::Extraction(
                "extractor returned no output".into(),
            ));
        }

        let Reconciled {
            mut record,
            outcome,
        } = reconcile(&raw);
        if !record.is_well_formed() {
            warn!(?outcome, "extracted record has no company name");
        }

        let report = validate_record(&self.taxonomy, &mut record);
        info!(
            corrections = report.corrections.len(),
            issues = report.issues.len(),
            "record validated"
        );
        Ok(record)
    }
}

/// Fail with `EmptyContent` when no crawled page has visible text.
fn ensure_content(url: &str, crawl: &CrawlResult) -> Result<()> {
    if crawl.pages.iter().any(|p| !p.text.trim().is_empty()) {
        return Ok(());
    }
    Err(FirmScopeError::EmptyContent(format!(
        "no content extracted from {url} ({} pages, {} fetch errors)",
        crawl.pages.len(),
        crawl.errors.len()
    )))
}

/// Parse a start URL; only absolute http(s) URLs are accepted.
fn parse_start_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| FirmScopeError::invalid_input(format!("malformed URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(FirmScopeError::invalid_input(format!(
            "URL '{url}' must be an absolute http(s) URL"
        ))),
    }
}

/// Cap `text` at `max_chars` characters, appending a truncation marker when cut.
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
    }
}
