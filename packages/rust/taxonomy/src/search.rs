//! Keyword search and sector recommendations over the taxonomy.
//!
//! These back the two tools offered to the extraction model.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::vocabulary::{SectorKind, Taxonomy};

const INDUSTRY_LIMIT: usize = 5;
const SUB_INDUSTRY_LIMIT: usize = 10;
const SOLUTION_AREA_LIMIT: usize = 10;

/// Fixed keyword → sector name hints used for recommendations.
const KEYWORD_SECTORS: &[(&str, &[&str])] = &[
    ("software", &["Information Technology", "Software Development"]),
    ("ai", &["Artificial Intelligence", "Machine Learning"]),
    ("blockchain", &["Blockchain", "Cryptocurrency"]),
    ("fintech", &["Finance", "Banking"]),
    ("healthcare", &["Healthcare", "Medical Services"]),
    ("ecommerce", &["E-Commerce", "Retail"]),
    ("logistics", &["Logistics", "Transportation"]),
    ("marketing", &["Marketing", "Digital Marketing"]),
    ("education", &["Education", "E-Learning"]),
    ("gaming", &["Gaming", "Entertainment"]),
];

/// Matches across all three vocabularies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectorMatches {
    pub industries: Vec<String>,
    pub sub_industries: Vec<String>,
    pub solution_areas: Vec<String>,
}

/// Suggested sectors for a company, with the reasons behind them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectorRecommendation {
    pub recommended_industries: Vec<String>,
    pub recommended_sub_industries: Vec<String>,
    pub recommended_solution_areas: Vec<String>,
    pub reasoning: Vec<String>,
}

/// Taxonomy lookups the extraction model may call while building a record.
pub trait TaxonomyQueries: Send + Sync {
    /// Search every vocabulary for `keywords`.
    fn search_by_keywords(&self, keywords: &str) -> SectorMatches;

    /// Suggest sectors from a free-text description and a technology list.
    fn recommend_for_description(
        &self,
        description: &str,
        technologies: &[String],
    ) -> SectorRecommendation;
}

/// Search over a shared [`Taxonomy`].
#[derive(Debug, Clone)]
pub struct SectorSearch {
    taxonomy: Arc<Taxonomy>,
}

impl SectorSearch {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    /// Industries containing, or contained in, `keywords`.
    pub fn search_industries(&self, keywords: &str, limit: usize) -> Vec<String> {
        self.search(SectorKind::Industry, keywords, limit, false)
    }

    /// Sub-industries by substring or shared word.
    pub fn search_sub_industries(&self, keywords: &str, limit: usize) -> Vec<String> {
        self.search(SectorKind::SubIndustry, keywords, limit, true)
    }

    /// Solution areas by substring or shared word.
    pub fn search_solution_areas(&self, keywords: &str, limit: usize) -> Vec<String> {
        self.search(SectorKind::SolutionArea, keywords, limit, true)
    }

    /// Top matches of every kind (3 industries, 5 sub-industries, 5 solution areas).
    pub fn search_all(&self, keywords: &str) -> SectorMatches {
        SectorMatches {
            industries: self.search_industries(keywords, 3),
            sub_industries: self.search_sub_industries(keywords, 5),
            solution_areas: self.search_solution_areas(keywords, 5),
        }
    }

    /// Recommend sectors from keyword hints in `description` and from each technology.
    pub fn recommend(&self, description: &str, technologies: &[String]) -> SectorRecommendation {
        let mut rec = SectorRecommendation::default();
        if description.trim().is_empty() {
            return rec;
        }

        let words = word_set(&description.to_lowercase().replace('-', ""));

        for (keyword, sectors) in KEYWORD_SECTORS {
            if !words.contains(*keyword) {
                continue;
            }
            for sector in *sectors {
                let industries = self.search_industries(sector, INDUSTRY_LIMIT);
                if let Some(first) = industries.first() {
                    rec.reasoning.push(format!(
                        "Found '{keyword}' in description, suggesting {first} industry"
                    ));
                }
                rec.recommended_industries
                    .extend(industries.into_iter().take(2));
                rec.recommended_sub_industries.extend(
                    self.search_sub_industries(sector, SUB_INDUSTRY_LIMIT)
                        .into_iter()
                        .take(3),
                );
                rec.recommended_solution_areas.extend(
                    self.search_solution_areas(sector, SOLUTION_AREA_LIMIT)
                        .into_iter()
                        .take(3),
                );
            }
        }

        for tech in technologies.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let areas: Vec<String> = self
                .search_all(tech)
                .solution_areas
                .into_iter()
                .take(2)
                .collect();
            rec.reasoning.push(format!(
                "Technology '{tech}' suggests solution areas: {}",
                areas.join(", ")
            ));
            rec.recommended_solution_areas.extend(areas);
        }

        dedup_in_order(&mut rec.recommended_industries);
        dedup_in_order(&mut rec.recommended_sub_industries);
        dedup_in_order(&mut rec.recommended_solution_areas);
        rec
    }

    fn search(&self, kind: SectorKind, keywords: &str, limit: usize, by_word: bool) -> Vec<String> {
        let needle = keywords.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_words = word_set(&needle);

        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for entry in self.taxonomy.entries(kind) {
            let lower = entry.to_lowercase();
            if lower == needle {
                exact.push(entry.clone());
            } else if lower.contains(&needle)
                || needle.contains(&lower)
                || (by_word && !needle_words.is_disjoint(&word_set(&lower)))
            {
                partial.push(entry.clone());
            }
        }

        exact.extend(partial);
        exact.truncate(limit);
        exact
    }
}

impl TaxonomyQueries for SectorSearch {
    fn search_by_keywords(&self, keywords: &str) -> SectorMatches {
        self.search_all(keywords)
    }

    fn recommend_for_description(
        &self,
        description: &str,
        technologies: &[String],
    ) -> SectorRecommendation {
        self.recommend(description, technologies)
    }
}

fn word_set(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
