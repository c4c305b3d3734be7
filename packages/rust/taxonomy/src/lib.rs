//! Controlled sector vocabulary, record validation and sector search.
//!
//! This crate provides:
//! - [`Taxonomy`] — industries, sub-industries and solution areas loaded from CSV
//! - [`validate_record`] — corrects or flags a record's categorical fields
//! - [`SectorSearch`] — keyword search and recommendations behind [`TaxonomyQueries`]

pub mod search;
pub mod validator;
pub mod vocabulary;

pub use search::{SectorMatches, SectorRecommendation, SectorSearch, TaxonomyQueries};
pub use validator::validate_record;
pub use vocabulary::{SectorKind, Taxonomy};
