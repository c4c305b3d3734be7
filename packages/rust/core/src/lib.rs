//! Pipeline orchestration and domain logic for FirmScope.
//!
//! This crate ties together crawling, model extraction, response
//! reconciliation, taxonomy validation and persistence into the single-URL
//! pipeline and the batch runner.

pub mod batch;
pub mod extraction;
pub mod history;
pub mod persist;
pub mod pipeline;
pub mod prompt;
pub mod reconcile;

pub use batch::{BatchMode, BatchProgress, SilentProgress};
pub use extraction::{ChatExtractor, ChatSettings, Extractor, dispatch_tool, load_requirements};
pub use history::ResultHistory;
pub use persist::{NullSink, ResultSink};
pub use pipeline::{Orchestrator, truncate_input};
pub use reconcile::{REPAIR_RULES, ReconcileOutcome, Reconciled, RepairRule, reconcile};
