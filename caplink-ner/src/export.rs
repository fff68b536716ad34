//! Mention exports
//!
//! Writes a run's rows as:
//! - `entities.jsonl`: one full JSON object per row
//! - `entities.csv`: flat table, nested fields embedded as JSON text
//! - `entities_needs_review.csv`: the flagged subset of the table

use caplink_common::MentionRow;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const JSONL_FILE: &str = "entities.jsonl";
pub const CSV_FILE: &str = "entities.csv";
pub const REVIEW_CSV_FILE: &str = "entities_needs_review.csv";

/// Column order of the tabular exports
pub const CSV_COLUMNS: &[&str] = &[
    "file_id",
    "cue_start",
    "cue_end",
    "mention_text",
    "label",
    "context",
    "char_start",
    "char_end",
    "wikidata_qid",
    "wikidata_label",
    "candidates",
    "other_ids",
    "link_confidence",
    "needs_review",
    "notes",
];

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot write {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("CSV error in {0}: {1}")]
    Csv(PathBuf, csv::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat row for CSV; field order is the column order
#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    file_id: &'a str,
    cue_start: &'a str,
    cue_end: &'a str,
    mention_text: &'a str,
    label: &'a str,
    context: &'a str,
    char_start: usize,
    char_end: usize,
    wikidata_qid: Option<&'a str>,
    wikidata_label: Option<&'a str>,
    candidates: String,
    other_ids: String,
    link_confidence: Option<f64>,
    needs_review: bool,
    notes: &'a str,
}

impl<'a> CsvRecord<'a> {
    fn from_row(row: &'a MentionRow) -> Result<Self, ExportError> {
        Ok(Self {
            file_id: &row.file_id,
            cue_start: &row.cue_start,
            cue_end: &row.cue_end,
            mention_text: &row.mention_text,
            label: &row.label,
            context: &row.context,
            char_start: row.char_start,
            char_end: row.char_end,
            wikidata_qid: row.resolved_id.as_deref(),
            wikidata_label: row.resolved_label.as_deref(),
            candidates: serde_json::to_string(&row.candidates)?,
            other_ids: serde_json::to_string(&row.authority_ids)?,
            link_confidence: row.confidence,
            needs_review: row.needs_review,
            notes: &row.note,
        })
    }
}

/// Written files and counts
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub rows: usize,
    pub needs_review: usize,
    pub jsonl_path: PathBuf,
    pub csv_path: PathBuf,
    pub review_csv_path: PathBuf,
}

/// One JSON object per line
pub fn write_jsonl(rows: &[MentionRow], path: &Path) -> Result<(), ExportError> {
    let io_err = |e| ExportError::Io(path.to_path_buf(), e);
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Table with header; absent values are empty cells
pub fn write_csv<'a>(
    rows: impl IntoIterator<Item = &'a MentionRow>,
    path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e| ExportError::Csv(path.to_path_buf(), e);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;

    // Header even when there are no rows
    writer.write_record(CSV_COLUMNS).map_err(csv_err)?;
    let mut count = 0;
    for row in rows {
        writer
            .serialize(CsvRecord::from_row(row)?)
            .map_err(csv_err)?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|e| ExportError::Io(path.to_path_buf(), e))?;
    Ok(count)
}

/// Write all three exports into `out_dir`, creating it if needed
pub fn export_all(rows: &[MentionRow], out_dir: &Path) -> Result<ExportSummary, ExportError> {
    std::fs::create_dir_all(out_dir).map_err(|e| ExportError::Io(out_dir.to_path_buf(), e))?;

    let jsonl_path = out_dir.join(JSONL_FILE);
    let csv_path = out_dir.join(CSV_FILE);
    let review_csv_path = out_dir.join(REVIEW_CSV_FILE);

    write_jsonl(rows, &jsonl_path)?;
    write_csv(rows, &csv_path)?;
    let needs_review = write_csv(rows.iter().filter(|r| r.needs_review), &review_csv_path)?;

    tracing::info!(
        rows = rows.len(),
        needs_review,
        "Wrote exports to {}",
        out_dir.display()
    );

    Ok(ExportSummary {
        rows: rows.len(),
        needs_review,
        jsonl_path,
        csv_path,
        review_csv_path,
    })
}
