//! The controlled sector vocabulary.
//!
//! Loaded once from a `;`-delimited CSV whose columns 1, 3 and 5 hold the
//! industry, sub-industry and solution area. Read-only afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use tracing::info;

use firmscope_shared::{FirmScopeError, Result};

/// Minimum number of columns a CSV row needs to be considered.
const MIN_COLUMNS: usize = 6;

/// Which vocabulary a categorical field is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorKind {
    Industry,
    SubIndustry,
    SolutionArea,
}

impl SectorKind {
    /// Field label used in report notes.
    pub fn label(self) -> &'static str {
        match self {
            Self::Industry => "industry",
            Self::SubIndustry => "sub-industry",
            Self::SolutionArea => "solution area",
        }
    }
}

impl fmt::Display for SectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Industries, sub-industries and solution areas, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    industries: BTreeSet<String>,
    sub_industries: BTreeSet<String>,
    solution_areas: BTreeSet<String>,
}

impl Taxonomy {
    /// Build a taxonomy from explicit entry lists. Blank entries are ignored.
    pub fn new(industries: &[&str], sub_industries: &[&str], solution_areas: &[&str]) -> Self {
        fn collect(items: &[&str]) -> BTreeSet<String> {
            items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }

        Self {
            industries: collect(industries),
            sub_industries: collect(sub_industries),
            solution_areas: collect(solution_areas),
        }
    }

    /// Load the vocabulary from a sector CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FirmScopeError::io(path, e))?;
        let taxonomy = Self::from_csv_str(&content)?;

        info!(
            path = %path.display(),
            industries = taxonomy.industries.len(),
            sub_industries = taxonomy.sub_industries.len(),
            solution_areas = taxonomy.solution_areas.len(),
            "loaded sector taxonomy"
        );

        Ok(taxonomy)
    }

    /// Parse sector CSV content. The first line is a header and is skipped.
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut lines = content.lines();
        if lines.next().is_none() {
            return Err(FirmScopeError::validation("sector CSV is empty"));
        }

        let mut taxonomy = Self::default();
        for line in lines {
            let cols: Vec<&str> = line.split(';').map(clean_cell).collect();
            if cols.len() < MIN_COLUMNS {
                continue;
            }
            for (idx, set) in [
                (1, &mut taxonomy.industries),
                (3, &mut taxonomy.sub_industries),
                (5, &mut taxonomy.solution_areas),
            ] {
                if !cols[idx].is_empty() {
                    set.insert(cols[idx].to_string());
                }
            }
        }

        Ok(taxonomy)
    }

    pub fn industries(&self) -> &BTreeSet<String> {
        &self.industries
    }

    pub fn sub_industries(&self) -> &BTreeSet<String> {
        &self.sub_industries
    }

    pub fn solution_areas(&self) -> &BTreeSet<String> {
        &self.solution_areas
    }

    /// The entry set for `kind`.
    pub fn entries(&self, kind: SectorKind) -> &BTreeSet<String> {
        match kind {
            SectorKind::Industry => &self.industries,
            SectorKind::SubIndustry => &self.sub_industries,
            SectorKind::SolutionArea => &self.solution_areas,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.industries.is_empty() && self.sub_industries.is_empty() && self.solution_areas.is_empty()
    }

    /// Whether `value` (trimmed) is a vocabulary entry. Case-sensitive.
    pub fn contains(&self, kind: SectorKind, value: &str) -> bool {
        self.entries(kind).contains(value.trim())
    }

    /// Find the closest vocabulary entry for `value`.
    ///
    /// Case-insensitive equality wins. Otherwise an entry containing, or
    /// contained in, the value matches; among several the longest entry is
    /// chosen, and equal lengths resolve to the lexicographically smaller one.
    pub fn closest(&self, kind: SectorKind, value: &str) -> Option<&str> {
        let needle = value.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let entries = self.entries(kind);
        if let Some(exact) = entries.iter().find(|e| e.to_lowercase() == needle) {
            return Some(exact);
        }

        entries
            .iter()
            .filter(|e| {
                let entry = e.to_lowercase();
                entry.contains(&needle) || needle.contains(&entry)
            })
            // BTreeSet iterates in ascending order, so keep the first of equal length.
            .fold(None::<&String>, |best, e| match best {
                Some(b) if b.chars().count() >= e.chars().count() => Some(b),
                _ => Some(e),
            })
            .map(String::as_str)
    }

    /// Plain-text listing of every category, for the extraction prompt.
    pub fn summary(&self) -> String {
        let join = |set: &BTreeSet<String>| set.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        format!(
            "VALID INDUSTRY CATEGORIES ({} total):\n{}\n\nVALID SUB-INDUSTRY CATEGORIES ({} total):\n{}\n\nVALID SOLUTION AREA CATEGORIES ({} total):\n{}\n",
            self.industries.len(),
            join(&self.industries),
            self.sub_industries.len(),
            join(&self.sub_industries),
            self.solution_areas.len(),
            join(&self.solution_areas),
        )
    }
}

/// Trim a CSV cell and drop surrounding double quotes.
fn clean_cell(cell: &str) -> &str {
    let cell = cell.trim();
    cell.strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .unwrap_or(cell)
        .trim()
}
