//! Categorical field validation against the sector vocabulary.

use tracing::debug;

use firmscope_shared::{StructuredRecord, ValidationReport};

use crate::vocabulary::{SectorKind, Taxonomy};

/// Validate and correct the industry, sub-industry and solution area of the
/// company and of every product.
///
/// Exact matches are left alone. Values with a close vocabulary entry are
/// replaced and noted as corrections; values with none are kept and noted as
/// issues. The returned report is also attached to `record.validation`.
pub fn validate_record(taxonomy: &Taxonomy, record: &mut StructuredRecord) -> ValidationReport {
    let mut report = ValidationReport::new();

    let info = &mut record.company_info;
    for (kind, field) in [
        (SectorKind::Industry, &mut info.industry),
        (SectorKind::SubIndustry, &mut info.sub_industry),
        (SectorKind::SolutionArea, &mut info.solution_area),
    ] {
        check_field(taxonomy, kind, field, &capitalize(kind.label()), &mut report);
    }

    for (i, product) in record.products.iter_mut().enumerate() {
        for (kind, field) in [
            (SectorKind::Industry, &mut product.industry),
            (SectorKind::SubIndustry, &mut product.sub_industry),
            (SectorKind::SolutionArea, &mut product.solution_area),
        ] {
            let subject = format!("Product {} {}", i + 1, kind.label());
            check_field(taxonomy, kind, field, &subject, &mut report);
        }
    }

    debug!(
        valid = report.valid,
        corrections = report.corrections.len(),
        issues = report.issues.len(),
        "record validated"
    );

    record.validation = Some(report.clone());
    report
}

fn check_field(
    taxonomy: &Taxonomy,
    kind: SectorKind,
    field: &mut Option<String>,
    subject: &str,
    report: &mut ValidationReport,
) {
    let Some(value) = field.as_deref() else {
        return;
    };
    if value.trim().is_empty() || taxonomy.contains(kind, value) {
        return;
    }

    match taxonomy.closest(kind, value) {
        Some(closest) => {
            report.add_correction(format!("{subject} '{value}' corrected to '{closest}'"));
            *field = Some(closest.to_string());
        }
        None => {
            report.add_issue(format!("{subject} '{value}' not found in valid categories"));
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use firmscope_shared::{CompanyInfo, Product};

    use super::*;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(
            &["Finance", "Fintech", "Healthcare"],
            &["Payments", "Lending"],
            &["Fraud Detection", "Risk Management"],
        )
    }

    fn record_with_industry(industry: &str) -> StructuredRecord {
        StructuredRecord {
            company_info: CompanyInfo {
                name: Some("Acme".into()),
                industry: Some(industry.into()),
                ..CompanyInfo::default()
            },
            ..StructuredRecord::default()
        }
    }

    #[test]
    fn exact_match_is_untouched() {
        let mut record = record_with_industry("Fintech");
        let report = validate_record(&taxonomy(), &mut record);
        assert!(report.valid);
        assert!(report.corrections.is_empty());
        assert!(report.issues.is_empty());
        assert_eq!(record.company_info.industry.as_deref(), Some("Fintech"));
    }

    #[test]
    fn close_value_is_corrected() {
        let mut record = record_with_industry("FintechX");
        let report = validate_record(&taxonomy(), &mut record);
        assert!(report.valid);
        assert_eq!(
            report.corrections,
            vec!["Industry 'FintechX' corrected to 'Fintech'"]
        );
        assert_eq!(record.company_info.industry.as_deref(), Some("Fintech"));
        assert_eq!(record.validation.as_ref(), Some(&report));
    }

    #[test]
    fn unknown_value_is_an_issue() {
        let mut record = record_with_industry("Zzz");
        let report = validate_record(&taxonomy(), &mut record);
        assert!(!report.valid);
        assert_eq!(report.issues, vec!["Industry 'Zzz' not found in valid categories"]);
        assert_eq!(record.company_info.industry.as_deref(), Some("Zzz"));
    }

    #[test]
    fn empty_and_absent_values_are_ignored() {
        let mut record = record_with_industry("  ");
        let report = validate_record(&taxonomy(), &mut record);
        assert!(report.valid);
        assert!(report.corrections.is_empty());

        let mut record = StructuredRecord::fallback();
        let report = validate_record(&taxonomy(), &mut record);
        assert_eq!(report, ValidationReport::new());
    }

    #[test]
    fn products_are_numbered_from_one() {
        let mut record = StructuredRecord {
            products: vec![
                Product {
                    name: Some("Ledger".into()),
                    sub_industry: Some("payments".into()),
                    ..Product::default()
                },
                Product {
                    name: Some("Shield".into()),
                    solution_area: Some("Quantum".into()),
                    ..Product::default()
                },
            ],
            ..StructuredRecord::default()
        };

        let report = validate_record(&taxonomy(), &mut record);
        assert_eq!(
            report.corrections,
            vec!["Product 1 sub-industry 'payments' corrected to 'Payments'"]
        );
        assert_eq!(
            report.issues,
            vec!["Product 2 solution area 'Quantum' not found in valid categories"]
        );
        assert!(!report.valid);
        assert_eq!(record.products[0].sub_industry.as_deref(), Some("Payments"));
    }

    #[test]
    fn company_notes_use_field_labels() {
        let mut record = StructuredRecord {
            company_info: CompanyInfo {
                sub_industry: Some("lending".into()),
                solution_area: Some("risk".into()),
                ..CompanyInfo::default()
            },
            ..StructuredRecord::default()
        };
        let report = validate_record(&taxonomy(), &mut record);
        assert_eq!(
            report.corrections,
            vec![
                "Sub-industry 'lending' corrected to 'Lending'",
                "Solution area 'risk' corrected to 'Risk Management'",
            ]
        );
    }
}
