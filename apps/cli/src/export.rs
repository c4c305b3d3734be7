//! Writing processing results to `--out` files.

use std::path::Path;

use color_eyre::eyre::{Result, eyre};
use firmscope_shared::ProcessingResult;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

const BASE_COLUMNS: [&str; 5] = ["url", "success", "pages_crawled", "processing_time", "timestamp"];

/// File format for exported results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ExportFormat {
    Json,
    Csv,
}

/// Write `results` to `path`. A single JSON result is written as an object,
/// several as an array.
pub(crate) fn write_results(
    path: &Path,
    format: ExportFormat,
    results: &[ProcessingResult],
) -> Result<()> {
    let content = match (format, results) {
        (ExportFormat::Json, [single]) => serde_json::to_string_pretty(single)?,
        (ExportFormat::Json, _) => serde_json::to_string_pretty(results)?,
        (ExportFormat::Csv, _) => results_to_csv(results)?,
    };
    std::fs::write(path, content).map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
    info!(path = %path.display(), ?format, rows = results.len(), "results written");
    Ok(())
}

/// One row per result: the run columns followed by a `company_<field>`
/// column for every company field seen in any record.
pub(crate) fn results_to_csv(results: &[ProcessingResult]) -> Result<String> {
    let companies = results
        .iter()
        .map(company_fields)
        .collect::<Result<Vec<_>>>()?;

    let mut company_columns: Vec<&str> = Vec::new();
    for key in companies.iter().flat_map(|fields| fields.keys()) {
        if !company_columns.contains(&key.as_str()) {
            company_columns.push(key.as_str());
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(
        BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(company_columns.iter().map(|k| format!("company_{k}"))),
    )?;

    for (result, fields) in results.iter().zip(&companies) {
        let mut row = vec![
            result.url().to_string(),
            result.is_success().to_string(),
            result.pages_crawled().to_string(),
            result.processing_time_secs().to_string(),
            result.timestamp().to_rfc3339(),
        ];
        row.extend(
            company_columns
                .iter()
                .map(|k| fields.get(*k).map(cell).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| eyre!("cannot flush CSV output: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn company_fields(result: &ProcessingResult) -> Result<Map<String, Value>> {
    let Some(record) = result.record() else {
        return Ok(Map::new());
    };
    match serde_json::to_value(&record.company_info)? {
        Value::Object(fields) => Ok(fields),
        _ => Ok(Map::new()),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
