//! Core domain types for FirmScope company records and pipeline results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Company name used by the fallback record.
pub const FALLBACK_COMPANY_NAME: &str = "Unknown Company";

/// Description used by the fallback record.
pub const FALLBACK_DESCRIPTION: &str =
    "Company information extraction failed due to technical issues.";

// ---------------------------------------------------------------------------
// StructuredRecord
// ---------------------------------------------------------------------------

/// Company-level fields of an extracted record. Every field is optional text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub logo: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub company_type: Option<String>,
    pub service_or_product: Option<String>,
    pub video_url: Option<String>,
    pub headquarter: Option<String>,
    pub city: Option<String>,
    pub employee_count: Option<String>,
    pub founded_year: Option<String>,
    pub business_model: Option<String>,
    pub women_founded: Option<String>,
    pub industry: Option<String>,
    pub sub_industry: Option<String>,
    pub solution_area: Option<String>,
    pub tags: Option<String>,
    pub active_customers: Option<String>,
    pub available_countries: Option<String>,
}

/// A service offered by the company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A product offered by the company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub logo: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub video: Option<String>,
    pub employee_count: Option<String>,
    pub founded_year: Option<String>,
    pub business_model: Option<String>,
    pub industry: Option<String>,
    pub sub_industry: Option<String>,
    pub solution_area: Option<String>,
    pub screenshots: Option<String>,
    pub how_it_works: Option<String>,
    pub value_proposition: Option<String>,
    pub use_case_title: Option<String>,
    pub use_case_description: Option<String>,
    pub case_study_title: Option<String>,
    pub customer_name: Option<String>,
    pub case_study_description: Option<String>,
    pub statistics_title: Option<String>,
    pub statistics_value: Option<String>,
    pub active_customers: Option<String>,
    pub customer_logos: Option<String>,
    pub available_countries: Option<String>,
    pub integrations: Option<String>,
    pub partnerships: Option<String>,
}

/// The structured company record produced from a website's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredRecord {
    pub company_info: CompanyInfo,
    pub services: Vec<Service>,
    pub products: Vec<Product>,
    /// Taxonomy validation outcome, attached after validation.
    #[serde(rename = "_validation", skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

impl StructuredRecord {
    /// The deterministic record returned when extraction output cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            company_info: CompanyInfo {
                name: Some(FALLBACK_COMPANY_NAME.into()),
                description: Some(FALLBACK_DESCRIPTION.into()),
                ..CompanyInfo::default()
            },
            services: Vec::new(),
            products: Vec::new(),
            validation: None,
        }
    }

    /// Whether this record is the fallback record.
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    /// A record is well formed when it names the company.
    pub fn is_well_formed(&self) -> bool {
        self.company_name().is_some()
    }

    /// The non-blank company name, if any.
    pub fn company_name(&self) -> Option<&str> {
        self.company_info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Outcome of validating a record's categorical fields.
///
/// `valid` is true exactly when `issues` is empty; notes can only be added
/// through [`ValidationReport::add_correction`] and [`ValidationReport::add_issue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub corrections: Vec<String>,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            corrections: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Record an automatic correction.
    pub fn add_correction(&mut self, note: impl Into<String>) {
        self.corrections.push(note.into());
    }

    /// Record an unresolved issue. Marks the report invalid.
    pub fn add_issue(&mut self, note: impl Into<String>) {
        self.issues.push(note.into());
        self.valid = false;
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Crawl summary
// ---------------------------------------------------------------------------

/// Per-page metadata kept in a processing result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub content_length: usize,
    pub headings_count: usize,
    pub links_count: usize,
}

/// Aggregate counts of one crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub total_pages: usize,
    pub pages_with_content: usize,
    pub total_content_length: usize,
    pub pages: Vec<PageSummary>,
}

// ---------------------------------------------------------------------------
// ProcessingResult
// ---------------------------------------------------------------------------

/// Outcome of running the pipeline for one URL.
///
/// Built only through [`ProcessingResult::succeeded`] and
/// [`ProcessingResult::failed`], so `success` always agrees with the presence
/// of a record and the absence of an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    url: String,
    success: bool,
    timestamp: DateTime<Utc>,
    processing_time_secs: f64,
    pages_crawled: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record: Option<StructuredRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crawl_summary: Option<CrawlSummary>,
}

impl ProcessingResult {
    /// A successful run that produced `record`.
    pub fn succeeded(
        url: impl Into<String>,
        record: StructuredRecord,
        summary: CrawlSummary,
        elapsed: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            success: true,
            timestamp: Utc::now(),
            processing_time_secs: elapsed.as_secs_f64(),
            pages_crawled: summary.total_pages,
            record: Some(record),
            error: None,
            crawl_summary: Some(summary),
        }
    }

    /// A failed run. `summary` is present when the crawl got far enough to produce one.
    pub fn failed(
        url: impl Into<String>,
        error: impl Into<String>,
        summary: Option<CrawlSummary>,
        elapsed: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            success: false,
            timestamp: Utc::now(),
            processing_time_secs: elapsed.as_secs_f64(),
            pages_crawled: summary.as_ref().map_or(0, |s| s.total_pages),
            record: None,
            error: Some(error.into()),
            crawl_summary: summary,
        }
    }

    /// Stamp the result with the time its run started.
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = at;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn processing_time_secs(&self) -> f64 {
        self.processing_time_secs
    }

    pub fn pages_crawled(&self) -> usize {
        self.pages_crawled
    }

    pub fn record(&self) -> Option<&StructuredRecord> {
        self.record.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn crawl_summary(&self) -> Option<&CrawlSummary> {
        self.crawl_summary.as_ref()
    }
}
