//! Durable recording of processing results.

use async_trait::async_trait;
use tracing::debug;

use firmscope_shared::{ProcessingResult, Result};
use firmscope_storage::Storage;

/// Where finished pipeline runs are written.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Record one result. Returns the company id when a record was stored.
    async fn persist(&self, result: &ProcessingResult) -> Result<Option<String>>;
}

#[async_trait]
impl ResultSink for Storage {
    async fn persist(&self, result: &ProcessingResult) -> Result<Option<String>> {
        let company_id = match result.record() {
            Some(record) if result.is_success() => {
                Some(self.upsert_company(result.url(), record).await?)
            }
            _ => None,
        };

        let log_id = self
            .append_processing_result(result, company_id.as_deref())
            .await?;
        debug!(url = %result.url(), log_id = %log_id, company_id = ?company_id, "result persisted");

        Ok(company_id)
    }
}

/// Sink that drops every result.
pub struct NullSink;

#[async_trait]
impl ResultSink for NullSink {
    async fn persist(&self, _result: &ProcessingResult) -> Result<Option<String>> {
        Ok(None)
    }
}
