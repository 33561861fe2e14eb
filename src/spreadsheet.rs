//! Spreadsheet input and output.
//!
//! Reading goes through `calamine` and yields an all-string DataFrame so that
//! spreadsheet and CSV inputs share the same coercion path. Writing goes
//! through `rust_xlsxwriter`, one worksheet with a header row.

use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use crate::error::ScreenError;

const MAX_XLSX_ROWS: usize = 1_048_576;
const MAX_XLSX_COLS: usize = 16_384;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Read one worksheet into a DataFrame with every column as String.
///
/// The first row is the header. Empty cells become nulls. When `sheet` is
/// `None` the first worksheet is used.
pub fn read_sheet_as_strings(path: &Path, sheet: Option<&str>) -> Result<DataFrame, ScreenError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name)?,
        None => workbook.worksheet_range_at(0).ok_or_else(|| {
            ScreenError::InvalidData(format!("{} has no worksheets", path.display()))
        })??,
    };

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .enumerate()
            .map(|(i, cell)| cell_text(cell).unwrap_or_else(|| format!("column_{i}")))
            .collect(),
        None => {
            return Err(ScreenError::InvalidData(format!(
                "{} has an empty worksheet",
                path.display()
            )))
        }
    };

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
    for cells in rows {
        for (i, cell) in cells.iter().enumerate().take(header.len()) {
            values[i].push(cell_text(cell));
        }
    }

    let columns: Vec<Column> = header
        .iter()
        .zip(values)
        .map(|(name, vals)| Column::new(name.trim().into(), vals))
        .collect();

    let df = DataFrame::new(columns)?;
    debug!(path = %path.display(), rows = df.height(), "worksheet loaded");
    Ok(df)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        other => Some(other.to_string()),
    }
}

/// Write the whole DataFrame to a new xlsx file, replacing any existing one.
///
/// Strings stay strings, numbers become numeric cells, dates become Excel
/// dates and nulls are left blank.
pub fn write_dataframe(df: &DataFrame, path: &Path, sheet_name: &str) -> Result<(), ScreenError> {
    if df.height() + 1 > MAX_XLSX_ROWS || df.width() > MAX_XLSX_COLS {
        return Err(ScreenError::InvalidData(format!(
            "{} rows x {} columns does not fit in one worksheet",
            df.height(),
            df.width()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (c, column) in df.get_columns().iter().enumerate() {
        let col_idx = c as u16;
        worksheet.write_string_with_format(0, col_idx, column.name().as_str(), &header_format)?;

        for r in 0..df.height() {
            let row_idx = (r + 1) as u32;
            match column.get(r)? {
                AnyValue::Null => {}
                AnyValue::Boolean(v) => {
                    worksheet.write_boolean(row_idx, col_idx, v)?;
                }
                AnyValue::String(s) => {
                    worksheet.write_string(row_idx, col_idx, s)?;
                }
                AnyValue::StringOwned(s) => {
                    worksheet.write_string(row_idx, col_idx, s.as_str())?;
                }
                AnyValue::Float64(v) => write_float(worksheet, row_idx, col_idx, v)?,
                AnyValue::Float32(v) => write_float(worksheet, row_idx, col_idx, v as f64)?,
                AnyValue::Int32(v) => {
                    worksheet.write_number(row_idx, col_idx, v as f64)?;
                }
                AnyValue::Int64(v) => {
                    worksheet.write_number(row_idx, col_idx, v as f64)?;
                }
                AnyValue::UInt32(v) => {
                    worksheet.write_number(row_idx, col_idx, v as f64)?;
                }
                AnyValue::Date(days) => {
                    match NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE) {
                        Some(date) => {
                            worksheet.write_datetime_with_format(
                                row_idx,
                                col_idx,
                                &date,
                                &date_format,
                            )?;
                        }
                        None => {
                            return Err(ScreenError::InvalidData(format!(
                                "date out of range in column '{}'",
                                column.name()
                            )))
                        }
                    }
                }
                other => {
                    worksheet.write_string(row_idx, col_idx, format!("{other}"))?;
                }
            }
        }
    }

    workbook.save(path)?;
    debug!(path = %path.display(), rows = df.height(), "workbook written");
    Ok(())
}

// Excel has no representation for infinities.
fn write_float(
    worksheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    value: f64,
) -> Result<(), ScreenError> {
    if value.is_finite() {
        worksheet.write_number(row, col, value)?;
    } else if !value.is_nan() {
        worksheet.write_string(row, col, value.to_string())?;
    }
    Ok(())
}
