//! Shared types, error model, and configuration for FirmScope.
//!
//! This crate is the foundation depended on by all other FirmScope crates.
//! It provides:
//! - [`FirmScopeError`] — the unified error type
//! - Domain types ([`StructuredRecord`], [`ValidationReport`], [`ProcessingResult`], ...)
//! - Configuration ([`AppConfig`], [`CrawlConfig`], [`BatchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, CrawlConfig, CrawlPoliciesConfig, CrawlerConfig, LlmConfig,
    ProcessingConfig, StorageConfig, TaxonomyConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{FirmScopeError, Result};
pub use types::{
    CompanyInfo, CrawlSummary, FALLBACK_COMPANY_NAME, FALLBACK_DESCRIPTION, PageSummary,
    ProcessingResult, Product, Service, StructuredRecord, ValidationReport,
};
