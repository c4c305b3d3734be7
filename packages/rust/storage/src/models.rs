//! Row types returned by the read side of [`crate::Storage`].

use serde::Serialize;

use firmscope_shared::{CrawlSummary, StructuredRecord};

/// One company as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub id: String,
    pub url: String,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub service_count: u64,
    pub product_count: u64,
    /// Timestamp of the latest processing run linked to the company.
    pub last_analyzed: Option<String>,
    pub updated_at: String,
}

/// A company with its full record and processing history.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyDetails {
    pub company: CompanySummary,
    pub record: StructuredRecord,
    pub results: Vec<ProcessingLogEntry>,
}

/// One row of the processing log.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingLogEntry {
    pub id: String,
    pub url: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub success: bool,
    pub pages_crawled: u64,
    pub processing_time_secs: f64,
    pub error: Option<String>,
    pub crawl_summary: Option<CrawlSummary>,
    pub timestamp: String,
}

/// A labelled count (industry histogram, per-day activity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub label: String,
    pub count: u64,
}

/// Aggregate database statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_companies: u64,
    pub total_results: u64,
    pub successful_results: u64,
    pub failed_results: u64,
    /// Ten most frequent company industries.
    pub top_industries: Vec<Count>,
    /// Processing runs per day over the last 30 days, newest first.
    pub recent_activity: Vec<Count>,
}
