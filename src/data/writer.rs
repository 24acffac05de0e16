use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{BooleanArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use log::debug;
use parquet::arrow::ArrowWriter;

use super::model::SummaryRecord;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Persist summary records.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – columns `subject_id`, `is_target_condition`, `difference_metric`
/// * `.json`    – records-oriented array, same keys
/// * `.csv`     – header row, same columns
///
/// Missing parent directories are created.
pub fn write_summaries(path: &Path, records: &[SummaryRecord]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !matches!(ext.as_str(), "parquet" | "pq" | "json" | "csv") {
        bail!("Unsupported output extension: .{ext}");
    }
    ensure_parent_dirs(path)?;

    match ext.as_str() {
        "parquet" | "pq" => write_parquet(path, records)?,
        "json" => write_json(path, records)?,
        _ => write_csv(path, records)?,
    }
    debug!("wrote {} summary records to {}", records.len(), path.display());
    Ok(())
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn write_csv(path: &Path, records: &[SummaryRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV output")?;
    if records.is_empty() {
        // serde only emits the header with the first record.
        writer
            .write_record(["subject_id", "is_target_condition", "difference_metric"])
            .context("writing CSV header")?;
    }
    for rec in records {
        writer.serialize(rec).context("writing CSV record")?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

fn write_json(path: &Path, records: &[SummaryRecord]) -> Result<()> {
    let file = fs::File::create(path).context("creating JSON output")?;
    serde_json::to_writer_pretty(BufWriter::new(file), records).context("writing JSON")?;
    Ok(())
}

fn write_parquet(path: &Path, records: &[SummaryRecord]) -> Result<()> {
    let batch = summaries_to_batch(records)?;
    let file = fs::File::create(path).context("creating parquet output")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Arrow conversion
// ---------------------------------------------------------------------------

/// Columnar view of the summaries, shared by the Parquet writer and the
/// table printer.
pub fn summaries_to_batch(records: &[SummaryRecord]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("subject_id", DataType::Utf8, false),
        Field::new("is_target_condition", DataType::Boolean, false),
        Field::new("difference_metric", DataType::Float64, false),
    ]));

    let subjects = StringArray::from_iter_values(records.iter().map(|r| r.subject_id.as_str()));
    let targets: BooleanArray = records
        .iter()
        .map(|r| Some(r.is_target_condition))
        .collect();
    let metrics = Float64Array::from_iter_values(records.iter().map(|r| r.difference_metric));

    RecordBatch::try_new(
        schema,
        vec![Arc::new(subjects), Arc::new(targets), Arc::new(metrics)],
    )
    .context("building summary record batch")
}

/// Render the summaries as an ASCII table.
pub fn format_table(records: &[SummaryRecord]) -> Result<String> {
    let batch = summaries_to_batch(records)?;
    let table = pretty_format_batches(&[batch]).context("formatting summary table")?;
    Ok(table.to_string())
}
