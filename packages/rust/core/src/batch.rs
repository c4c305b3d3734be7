//! Batch processing of many URLs, sequentially or with a bounded worker pool.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::{FutureExt, StreamExt, stream};
use tracing::{error, info, instrument};

use firmscope_shared::{BatchConfig, ProcessingResult};

use crate::extraction::Extractor;
use crate::pipeline::Orchestrator;

/// How a batch is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// One URL at a time, in input order, with a delay between items.
    Sequential,
    /// Chunks of `batch_size`, up to `max_parallel` pipelines at once.
    Parallel,
}

impl BatchMode {
    pub fn from_config(config: &BatchConfig) -> Self {
        if config.parallel_enabled {
            Self::Parallel
        } else {
            Self::Sequential
        }
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch runs.
pub trait BatchProgress: Send + Sync {
    /// Called once before any URL is processed.
    fn started(&self, total: usize, mode: BatchMode);
    /// Called after every URL, in completion order.
    fn item_finished(&self, done: usize, total: usize, result: &ProcessingResult);
    /// Called after each parallel chunk.
    fn chunk_finished(&self, chunk: usize, chunks: usize);
}

/// No-op batch progress.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn started(&self, _total: usize, _mode: BatchMode) {}
    fn item_finished(&self, _done: usize, _total: usize, _result: &ProcessingResult) {}
    fn chunk_finished(&self, _chunk: usize, _chunks: usize) {}
}

// ---------------------------------------------------------------------------
// Batch runs
// ---------------------------------------------------------------------------

impl Orchestrator {
    /// Process every URL and return exactly one result per input.
    ///
    /// `mode` overrides the configured default. Sequential results are in
    /// input order; parallel results are in completion order.
    #[instrument(skip_all, fields(urls = urls.len()))]
    pub async fn run_batch(
        &self,
        urls: &[String],
        mode: Option<BatchMode>,
        progress: &dyn BatchProgress,
    ) -> Vec<ProcessingResult> {
        let mode = mode.unwrap_or_else(|| BatchMode::from_config(&self.batch));
        info!(?mode, "starting batch");
        progress.started(urls.len(), mode);

        let started = Instant::now();
        let results = match mode {
            BatchMode::Sequential => self.run_sequential(urls, progress).await,
            BatchMode::Parallel => self.run_parallel(urls, progress).await,
        };

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            secs = started.elapsed().as_secs_f64(),
            "batch complete"
        );
        results
    }

    async fn run_sequential(
        &self,
        urls: &[String],
        progress: &dyn BatchProgress,
    ) -> Vec<ProcessingResult> {
        let extractor = self.extractor(0);
        let delay = Duration::from_millis(self.batch.batch_delay_ms);
        let total = urls.len();

        let mut results = Vec::with_capacity(total);
        for (i, url) in urls.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = self.guarded(url, extractor.as_ref()).await;
            progress.item_finished(i + 1, total, &result);
            results.push(result);
        }
        results
    }

    async fn run_parallel(
        &self,
        urls: &[String],
        progress: &dyn BatchProgress,
    ) -> Vec<ProcessingResult> {
        let total = urls.len();
        let batch_size = self.batch.batch_size.max(1);
        let workers = self.batch.max_parallel.max(1);
        let chunks = total.div_ceil(batch_size);

        let mut results = Vec::with_capacity(total);
        for (chunk_index, chunk) in urls.chunks(batch_size).enumerate() {
            let mut pending = stream::iter(chunk.iter().enumerate())
                .map(|(i, url)| {
                    let extractor = self.extractor(i);
                    async move { self.guarded(url, extractor.as_ref()).await }
                })
                .buffer_unordered(workers);

            while let Some(result) = pending.next().await {
                progress.item_finished(results.len() + 1, total, &result);
                results.push(result);
            }
            info!(chunk = chunk_index + 1, chunks, done = results.len(), "chunk complete");
            progress.chunk_finished(chunk_index + 1, chunks);
        }
        results
    }

    /// Run one pipeline, turning a panic into a recorded failed result.
    async fn guarded(&self, url: &str, extractor: &dyn Extractor) -> ProcessingResult {
        let started_at = Utc::now();
        let started = Instant::now();
        match AssertUnwindSafe(self.process_with(url, extractor))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(url, panic = %message, "pipeline panicked");
                let result = ProcessingResult::failed(
                    url,
                    format!("Error processing {url}: pipeline panicked: {message}"),
                    None,
                    started.elapsed(),
                )
                .started_at(started_at);
                self.record(result).await
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
