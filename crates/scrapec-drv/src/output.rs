//! Result serialisation to JSON and CSV files.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexSet;
use scrapec_interp::{Row, Value};

/// Writes rows to a file, picking the format from the extension.
pub fn save(path: &Path, rows: &[Row]) -> Result<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => write_json(path, rows),
        Some("csv") => write_csv(path, rows),
        _ => bail!(
            "unsupported output format '{}' (use .json or .csv)",
            path.display()
        ),
    }
}

fn write_json(path: &Path, rows: &[Row]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, rows).context("could not serialise rows")?;
    Ok(())
}

/// CSV headers are the union of all column names in first-seen order;
/// list values join with `|`, nulls render empty.
fn write_csv(path: &Path, rows: &[Row]) -> Result<()> {
    if rows.is_empty() {
        tracing::warn!("no rows to save, skipping CSV output");
        return Ok(());
    }

    let mut columns: IndexSet<&str> = IndexSet::new();
    for row in rows {
        for column in row.keys() {
            columns.insert(column.as_str());
        }
    }
    if columns.is_empty() {
        tracing::warn!("rows have no columns, skipping CSV output");
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("could not create '{}'", path.display()))?;

    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(*column).map(render_value).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush().context("could not flush CSV output")?;
    Ok(())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(text) => text.clone(),
        Value::List(items) => items.join("|"),
    }
}
