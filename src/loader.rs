//! Table ingestion and cleaning helpers shared by both pipelines.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::ScreenError;
use crate::spreadsheet;

/// Read a CSV file with all columns as String dtype.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, ScreenError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!(path = %path.display(), rows = df.height(), "csv loaded");
    Ok(df)
}

/// Read a CSV or spreadsheet depending on the file extension.
///
/// `.csv`/`.txt` go through polars, anything else through calamine.
/// `sheet` is ignored for delimited files.
pub fn read_table_as_strings(path: &Path, sheet: Option<&str>) -> Result<DataFrame, ScreenError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv") | Some("txt") => read_csv_as_strings(path),
        _ => spreadsheet::read_sheet_as_strings(path, sheet),
    }
}

/// Snake-case a raw header: `" Location ID "` becomes `location_id`.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Normalize every column name, then apply an optional rename map keyed by
/// the normalized name.
pub fn normalize_column_names(
    mut df: DataFrame,
    rename: &BTreeMap<String, String>,
) -> Result<DataFrame, ScreenError> {
    let names: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| {
            let normalized = normalize_column_name(c);
            rename.get(&normalized).cloned().unwrap_or(normalized)
        })
        .collect();
    df.set_column_names(names.as_slice())?;
    Ok(df)
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), ScreenError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(ScreenError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Parse string columns to Float64. Blank or non-numeric text becomes null.
pub fn parse_float_columns(df: DataFrame, columns: &[&str]) -> Result<DataFrame, ScreenError> {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|&c| {
            col(c)
                .str()
                .strip_chars(lit(" \t\r\n"))
                .cast(DataType::Float64)
        })
        .collect();
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Trim surrounding whitespace from string columns.
pub fn strip_columns(df: DataFrame, columns: &[&str]) -> Result<DataFrame, ScreenError> {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|&c| col(c).str().strip_chars(lit(" \t\r\n")))
        .collect();
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Parse a string column to Date using the given format string.
/// Nulls stay null; text that does not match the format is an error.
/// Dates are join keys, so a bad date fails the load instead of silently
/// dropping the row from every join.
pub fn parse_date_column(
    df: DataFrame,
    column: &str,
    format: &str,
) -> Result<DataFrame, ScreenError> {
    let df = df
        .lazy()
        .with_columns([col(column)
            .str()
            .strip_chars(lit(" \t\r\n"))
            .str()
            .to_date(StrptimeOptions {
                format: Some(format.into()),
                strict: true,
                ..Default::default()
            })])
        .collect()?;
    Ok(df)
}
