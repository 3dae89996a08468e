//! Artifact encoding: [`StructuredResult`] → one file in the chosen format.
//!
//! | Format | Shape                                                         |
//! |--------|---------------------------------------------------------------|
//! | json   | `[{"page": 1, "text": "…", "tables": [[{"0": "…"}]]}, …]`      |
//! | csv    | every row of every table, flattened; page boundaries dropped  |
//! | txt    | `--- Page N ---` header, page text, blank line, per page      |
//!
//! The CSV flattening is lossy on purpose: the format is meant for loading
//! all tabular data of a document into a spreadsheet in one go. Its header
//! is the union of column labels in first-seen order; rows that lack a
//! column get an empty cell. A document without tables yields an empty file.
//!
//! Runs inside the worker pool. On error a partial file may be left at
//! `output_path`; removing it is the caller's job.

use crate::error::ExtractError;
use crate::output::{OutputFormat, PageRecord, TableRow};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Write `pages` to `output_path` encoded as `format`.
pub fn serialize(
    pages: &[PageRecord],
    format: OutputFormat,
    output_path: &Path,
) -> Result<(), ExtractError> {
    let fail = |detail: String| ExtractError::Serialization {
        format: format.to_string(),
        path: output_path.to_path_buf(),
        detail,
    };

    let file = File::create(output_path).map_err(|e| fail(e.to_string()))?;
    let mut out = BufWriter::new(file);

    match format {
        OutputFormat::Json => write_json(pages, &mut out).map_err(fail)?,
        OutputFormat::Csv => write_csv(pages, &mut out).map_err(fail)?,
        OutputFormat::Txt => write_txt(pages, &mut out).map_err(|e| fail(e.to_string()))?,
    }
    out.flush().map_err(|e| fail(e.to_string()))?;

    debug!(
        "Serialized {} pages as {} → {}",
        pages.len(),
        format,
        output_path.display()
    );
    Ok(())
}

fn write_json<W: Write>(pages: &[PageRecord], out: &mut W) -> Result<(), String> {
    serde_json::to_writer_pretty(&mut *out, pages).map_err(|e| e.to_string())?;
    out.write_all(b"\n").map_err(|e| e.to_string())
}

fn write_csv<W: Write>(pages: &[PageRecord], out: &mut W) -> Result<(), String> {
    let rows: Vec<&TableRow> = pages
        .iter()
        .flat_map(|p| p.tables.iter())
        .flat_map(|t| t.iter())
        .collect();
    if rows.is_empty() {
        return Ok(());
    }

    let header = union_columns(&rows);
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    writer.write_record(&header).map_err(|e| e.to_string())?;
    for row in rows {
        writer
            .write_record(header.iter().map(|label| row.get(label).unwrap_or("")))
            .map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

/// Column labels across `rows`, in first-seen order.
fn union_columns(rows: &[&TableRow]) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for row in rows {
        for label in row.labels() {
            if !header.iter().any(|h| h == label) {
                header.push(label.to_string());
            }
        }
    }
    header
}

fn write_txt<W: Write>(pages: &[PageRecord], out: &mut W) -> std::io::Result<()> {
    for page in pages {
        writeln!(out, "--- Page {} ---", page.page)?;
        write!(out, "{}\n\n", page.text)?;
    }
    Ok(())
}
