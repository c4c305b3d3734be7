//! Tolerant parsing of extractor output into a [`StructuredRecord`].
//!
//! The extractor is a free-text collaborator: its output may be fenced,
//! wrapped in prose, or syntactically broken. [`reconcile`] never fails; it
//! returns a parsed record, a repaired record, or the fallback record.
//!
//! Repair rules run in [`REPAIR_RULES`] order and the text is re-parsed after
//! every rule that changes it, stopping at the first successful parse. Later
//! rules are skipped once the text parses, so a rule never rewrites text that
//! is already valid JSON.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use firmscope_shared::{FirmScopeError, Result, StructuredRecord};

/// Outer code fence with an optional language tag.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\s*```\z").expect("valid regex")
});

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").expect("valid regex")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

static DOUBLE_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]*)\]\]").expect("valid regex"));

// ---------------------------------------------------------------------------
// Repair rules
// ---------------------------------------------------------------------------

/// A named text transformation applied to malformed extractor output.
#[derive(Clone, Copy)]
pub struct RepairRule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

impl std::fmt::Debug for RepairRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairRule").field("name", &self.name).finish()
    }
}

/// Repair rules, in application order.
pub const REPAIR_RULES: &[RepairRule] = &[
    RepairRule {
        name: "isolate_object",
        apply: isolate_object,
    },
    RepairRule {
        name: "strip_markup",
        apply: strip_markup,
    },
    RepairRule {
        name: "quote_bare_keys",
        apply: quote_bare_keys,
    },
    RepairRule {
        name: "drop_trailing_commas",
        apply: drop_trailing_commas,
    },
    RepairRule {
        name: "backticks_to_quotes",
        apply: backticks_to_quotes,
    },
    RepairRule {
        name: "collapse_double_brackets",
        apply: collapse_double_brackets,
    },
    RepairRule {
        name: "strip_non_printable",
        apply: strip_non_printable,
    },
];

/// Keep the text between the first `{` and the last `}`.
pub fn isolate_object(s: &str) -> String {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => s[start..=end].to_string(),
        _ => s.to_string(),
    }
}

/// Remove script blocks and HTML tags.
pub fn strip_markup(s: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(s, "");
    MARKUP_TAG.replace_all(&without_scripts, "").into_owned()
}

/// Quote unquoted object keys: `{name: 1}` becomes `{"name": 1}`.
pub fn quote_bare_keys(s: &str) -> String {
    BARE_KEY.replace_all(s, r#"$1"$2":"#).into_owned()
}

/// Remove commas directly before a closing brace or bracket.
pub fn drop_trailing_commas(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = TRAILING_COMMA.replace_all(&current, "$1").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

pub fn backticks_to_quotes(s: &str) -> String {
    s.replace('`', "\"")
}

/// `[[text]]` becomes `"text"`.
pub fn collapse_double_brackets(s: &str) -> String {
    DOUBLE_BRACKETS.replace_all(s, r#""$1""#).into_owned()
}

/// Drop control characters other than newline, carriage return and tab,
/// plus zero-width spaces and byte-order marks.
pub fn strip_non_printable(s: &str) -> String {
    s.chars()
        .filter(|c| {
            !matches!(c, '\u{200b}' | '\u{feff}')
                && (!c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// How the record was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The output parsed as-is (after fence stripping).
    Parsed,
    /// The output parsed after applying the named repair rules.
    Repaired { rules: Vec<&'static str> },
    /// Nothing parsed; the fallback record was returned.
    Fallback,
}

/// A reconciled record and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub record: StructuredRecord,
    pub outcome: ReconcileOutcome,
}

/// Turn raw extractor output into a structured record.
pub fn reconcile(raw: &str) -> Reconciled {
    let text = strip_code_fence(raw);

    match parse_record(&text) {
        Ok(record) => {
            debug!("extractor output parsed");
            return Reconciled {
                record,
                outcome: ReconcileOutcome::Parsed,
            };
        }
        Err(e) => debug!(error = %e, "strict parse failed, repairing"),
    }

    let mut repaired = text;
    let mut applied = Vec::new();
    for rule in REPAIR_RULES {
        let next = (rule.apply)(&repaired);
        if next == repaired {
            continue;
        }
        repaired = next;
        applied.push(rule.name);

        if let Ok(record) = parse_record(&repaired) {
            info!(rules = ?applied, "extractor output repaired");
            return Reconciled {
                record,
                outcome: ReconcileOutcome::Repaired { rules: applied },
            };
        }
    }

    warn!(rules = ?applied, "extractor output unparseable, using fallback record");
    Reconciled {
        record: StructuredRecord::fallback(),
        outcome: ReconcileOutcome::Fallback,
    }
}

/// Trim and strip one pair of surrounding code fences.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Strictly parse a JSON object into a record, coercing loosely typed fields.
pub fn parse_record(text: &str) -> Result<StructuredRecord> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| FirmScopeError::parse(e.to_string()))?;

    let Value::Object(obj) = &mut value else {
        return Err(FirmScopeError::parse("extractor output is not a JSON object"));
    };
    coerce_record(obj);

    serde_json::from_value(value).map_err(|e| FirmScopeError::parse(e.to_string()))
}

fn coerce_record(obj: &mut Map<String, Value>) {
    obj.remove("_validation");

    let company_info = match obj.remove("company_info") {
        Some(Value::Object(mut info)) => {
            coerce_fields(&mut info);
            Value::Object(info)
        }
        _ => Value::Object(Map::new()),
    };
    obj.insert("company_info".into(), company_info);

    let services = match obj.remove("services") {
        Some(Value::Array(items)) => items.into_iter().filter_map(coerce_service).collect(),
        Some(item @ Value::Object(_)) => coerce_service(item).into_iter().collect(),
        _ => Vec::new(),
    };
    obj.insert("services".into(), Value::Array(services));

    let products = match obj.remove("products") {
        Some(Value::Array(items)) => items.into_iter().filter_map(coerce_product).collect(),
        Some(item @ Value::Object(_)) => coerce_product(item).into_iter().collect(),
        _ => Vec::new(),
    };
    obj.insert("products".into(), Value::Array(products));
}

fn coerce_service(item: Value) -> Option<Value> {
    match item {
        Value::Object(mut fields) => {
            coerce_fields(&mut fields);
            Some(Value::Object(fields))
        }
        Value::String(name) if !name.trim().is_empty() => {
            let mut fields = Map::new();
            fields.insert("name".into(), Value::String(name));
            Some(Value::Object(fields))
        }
        _ => None,
    }
}

fn coerce_product(item: Value) -> Option<Value> {
    match item {
        Value::Object(mut fields) => {
            coerce_fields(&mut fields);
            Some(Value::Object(fields))
        }
        _ => None,
    }
}

/// Every record field is optional text; make each value fit that shape.
fn coerce_fields(fields: &mut Map<String, Value>) {
    for value in fields.values_mut() {
        *value = to_text(value.take());
    }
}

fn to_text(value: Value) -> Value {
    match value {
        Value::Null | Value::String(_) => value,
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(|item| match to_text(item) {
                    Value::String(s) if !s.trim().is_empty() => Some(s),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                Value::Null
            } else {
                Value::String(parts.join(", "))
            }
        }
        obj @ Value::Object(_) => Value::String(obj.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use firmscope_shared::{CompanyInfo, FALLBACK_COMPANY_NAME, Product, Service};

    use super::*;

    fn sample_record() -> StructuredRecord {
        StructuredRecord {
            company_info: CompanyInfo {
                name: Some("Acme".into()),
                industry: Some("Finance".into()),
                founded_year: Some("2015".into()),
                ..CompanyInfo::default()
            },
            services: vec![Service {
                name: Some("Consulting".into()),
                description: Some("Payments advice".into()),
            }],
            products: vec![Product {
                name: Some("Ledger".into()),
                integrations: Some("Stripe, Adyen".into()),
                ..Product::default()
            }],
            validation: None,
        }
    }

    #[test]
    fn valid_input_roundtrips_exactly() {
        let record = sample_record();
        let json = serde_json::to_string_pretty(&record).unwrap();
        let reconciled = reconcile(&json);
        assert_eq!(reconciled.outcome, ReconcileOutcome::Parsed);
        assert_eq!(reconciled.record, record);
    }

    #[test]
    fn fenced_and_unfenced_agree() {
        let json = serde_json::to_string(&sample_record()).unwrap();
        let plain = reconcile(&json);
        for fenced in [
            format!("```json\n{json}\n```"),
            format!("```\n{json}\n```"),
            format!("  ```json {json} ```  "),
        ] {
            let reconciled = reconcile(&fenced);
            assert_eq!(reconciled, plain, "differs for {fenced:?}");
        }
    }

    #[test]
    fn garbage_yields_fallback() {
        for raw in ["", "I could not find any company information.", "{{{", "[1, 2, 3]"] {
            let reconciled = reconcile(raw);
            assert_eq!(reconciled.outcome, ReconcileOutcome::Fallback, "for {raw:?}");
            assert_eq!(reconciled.record, StructuredRecord::fallback());
        }
        assert_eq!(
            reconcile("nope").record.company_name(),
            Some(FALLBACK_COMPANY_NAME)
        );
    }

    #[test]
    fn prose_wrapped_object_is_repaired() {
        let raw = r#"Here is the data: {"company_info": {"name": "Acme"}} Hope this helps!"#;
        let reconciled = reconcile(raw);
        assert_eq!(
            reconciled.outcome,
            ReconcileOutcome::Repaired {
                rules: vec!["isolate_object"]
            }
        );
        assert_eq!(reconciled.record.company_name(), Some("Acme"));
    }

    #[test]
    fn repair_stops_at_first_successful_parse() {
        let raw = r#"Result: {"company_info": {"name": "Acme", "description": "see [[wiki]]"}}"#;
        let reconciled = reconcile(raw);
        assert_eq!(
            reconciled.outcome,
            ReconcileOutcome::Repaired {
                rules: vec!["isolate_object"]
            }
        );
        assert_eq!(
            reconciled.record.company_info.description.as_deref(),
            Some("see [[wiki]]")
        );
    }

    #[test]
    fn broken_syntax_is_repaired() {
        let raw = "{company_info: {name: `Acme`, industry: \"Finance\",}, services: [], products: [],}";
        let reconciled = reconcile(raw);
        assert!(matches!(reconciled.outcome, ReconcileOutcome::Repaired { .. }));
        assert_eq!(reconciled.record.company_name(), Some("Acme"));
        assert_eq!(reconciled.record.company_info.industry.as_deref(), Some("Finance"));
    }

    #[test]
    fn scalars_and_lists_are_coerced() {
        let raw = r##"{
            "company_info": {"name": "Acme", "founded_year": 2015, "women_founded": true,
                             "tags": ["#fintech", "#payments"], "city": null},
            "services": ["Consulting", {"name": "Audit", "description": null}],
            "products": null
        }"##;
        let reconciled = reconcile(raw);
        assert_eq!(reconciled.outcome, ReconcileOutcome::Parsed);
        let info = &reconciled.record.company_info;
        assert_eq!(info.founded_year.as_deref(), Some("2015"));
        assert_eq!(info.women_founded.as_deref(), Some("true"));
        assert_eq!(info.tags.as_deref(), Some("#fintech, #payments"));
        assert_eq!(reconciled.record.services.len(), 2);
        assert_eq!(reconciled.record.services[0].name.as_deref(), Some("Consulting"));
        assert!(reconciled.record.products.is_empty());
    }

    #[test]
    fn null_company_info_becomes_empty() {
        let reconciled = reconcile(r#"{"company_info": null, "services": null}"#);
        assert_eq!(reconciled.outcome, ReconcileOutcome::Parsed);
        assert_eq!(reconciled.record, StructuredRecord::default());
        assert!(!reconciled.record.is_well_formed());
    }

    #[test]
    fn extractor_supplied_validation_is_ignored() {
        let reconciled = reconcile(r#"{"company_info": {"name": "Acme"}, "_validation": "bogus"}"#);
        assert_eq!(reconciled.outcome, ReconcileOutcome::Parsed);
        assert!(reconciled.record.validation.is_none());
    }

    // -- individual rules --------------------------------------------------

    #[test]
    fn rule_isolate_object() {
        assert_eq!(isolate_object("abc {\"a\": 1} def"), "{\"a\": 1}");
        assert_eq!(isolate_object("no braces"), "no braces");
    }

    #[test]
    fn rule_strip_markup() {
        assert_eq!(
            strip_markup(r#"{"a": "<b>bold</b>"}<script type="x">alert(1)</script>"#),
            r#"{"a": "bold"}"#
        );
    }

    #[test]
    fn rule_quote_bare_keys() {
        assert_eq!(quote_bare_keys("{name: 1, city : 2}"), r#"{"name": 1, "city": 2}"#);
        assert_eq!(quote_bare_keys(r#"{"name": 1}"#), r#"{"name": 1}"#);
    }

    #[test]
    fn rule_drop_trailing_commas() {
        assert_eq!(drop_trailing_commas("[1, 2, ]"), "[1, 2]");
        assert_eq!(drop_trailing_commas("{\"a\": [1,],,}"), "{\"a\": [1]}");
    }

    #[test]
    fn rule_backticks_to_quotes() {
        assert_eq!(backticks_to_quotes("{`a`: `b`}"), "{\"a\": \"b\"}");
    }

    #[test]
    fn rule_collapse_double_brackets() {
        assert_eq!(
            collapse_double_brackets(r#"{"partners": [[Stripe, Adyen]]}"#),
            r#"{"partners": "Stripe, Adyen"}"#
        );
    }

    #[test]
    fn rule_strip_non_printable() {
        assert_eq!(
            strip_non_printable("{\u{0}\"a\u{200b}\":\t\"İstanbul\"\u{feff}}\n"),
            "{\"a\":\t\"İstanbul\"}\n"
        );
    }

    #[test]
    fn rules_are_idempotent() {
        let samples = [
            "text {name: `Acme`, tags: [[a, b]],} <i>x</i>\u{200b}",
            "{\"company_info\": {\"name\": \"Acme\"}}",
            "",
        ];
        for rule in REPAIR_RULES {
            for sample in samples {
                let once = (rule.apply)(sample);
                let twice = (rule.apply)(&once);
                assert_eq!(once, twice, "{} not idempotent on {sample:?}", rule.name);
            }
        }
    }
}
