//! Tabular input feed loading.
//!
//! The feed parameterises a run: each record becomes one execution of
//! the script with its `$variables` bound through the script's
//! `data_schema` block. CSV files need a header row; JSON files are an
//! array of flat objects.

use std::path::Path;

use anyhow::{bail, Context, Result};
use scrapec_interp::FeedRow;
use scrapec_par::VariableDecl;
use tracing::warn;

/// Loads a feed file and binds its columns through the schema.
pub fn load(path: &Path, schema: Option<&[VariableDecl]>) -> Result<Vec<FeedRow>> {
    let Some(schema) = schema else {
        bail!(
            "--data was given but the script has no data_schema block \
             declaring which columns to bind"
        );
    };

    let records = match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => read_csv(path)?,
        Some("json") => read_json(path)?,
        _ => bail!(
            "unsupported feed format '{}' (use .csv or .json)",
            path.display()
        ),
    };

    Ok(records
        .into_iter()
        .map(|record| bind(&record, schema))
        .collect())
}

/// One raw feed record: column name → value.
type Record = Vec<(String, String)>;

fn read_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not read feed '{}'", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("feed has no header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("malformed CSV record")?;
        records.push(
            headers
                .iter()
                .cloned()
                .zip(row.iter().map(str::to_string))
                .collect(),
        );
    }

    Ok(records)
}

fn read_json(path: &Path) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read feed '{}'", path.display()))?;

    let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(&text).context("feed must be a JSON array of objects")?;

    Ok(parsed
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(key, value)| (key, json_scalar_to_string(value)))
                .collect()
        })
        .collect())
}

fn json_scalar_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Binds one record's columns to `$variables` through the schema.
/// Columns the record lacks bind to the empty string with a warning,
/// so `is_empty` can pick them up in the script.
fn bind(record: &Record, schema: &[VariableDecl]) -> FeedRow {
    let bindings = schema.iter().map(|decl| {
        let value = record
            .iter()
            .find(|(column, _)| column == &decl.column)
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| {
                warn!(column = decl.column.as_str(), "feed record lacks column");
                String::new()
            });
        (decl.variable.clone(), value)
    });

    FeedRow::new(bindings)
}
