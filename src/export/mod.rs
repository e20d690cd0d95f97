//! Spreadsheet artifacts.
//!
//! Writing goes through `rust_xlsxwriter`, followed by a best-effort
//! formatting pass (bold header, auto-sized columns). Reading back for the
//! report goes through `calamine`.

use crate::models::{ProcessError, Table};
use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Minimum column width applied by the formatting pass.
const MIN_COLUMN_WIDTH: usize = 10;

/// Extra characters added to the longest cell of a column.
const COLUMN_PADDING: usize = 2;

/// File name for a group's artifact: `veiculos_<group>_filtrado_<timestamp>.xlsx`.
///
/// The timestamp carries the date, time and the first five microsecond digits.
pub fn artifact_file_name(group: &str, now: DateTime<Local>) -> String {
    let mut stamp = now.format("%Y%m%d_%H%M%S_%6f").to_string();
    stamp.truncate(21);
    format!("veiculos_{}_filtrado_{}.xlsx", group.to_lowercase(), stamp)
}

/// Pick a path inside `dir` for a group's artifact that does not exist yet.
pub fn unique_artifact_path(dir: &Path, group: &str, now: DateTime<Local>) -> PathBuf {
    let name = artifact_file_name(group, now);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name.trim_end_matches(".xlsx");
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.xlsx")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Write a table to a new spreadsheet, then apply the formatting pass.
///
/// Formatting failures are logged and do not fail the write.
pub fn write_artifact(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    write_cells(worksheet, table).map_err(|e| ProcessError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Err(e) = format_worksheet(worksheet, table) {
        warn!("Failed to format {}: {}", path.display(), e);
    }

    workbook.save(path).map_err(|e| ProcessError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

fn write_cells(worksheet: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let excel_row = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                worksheet.write_string(excel_row, col as u16, cell)?;
            }
        }
    }

    Ok(())
}

/// Bold header row and auto-sized columns.
fn format_worksheet(worksheet: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    let bold = Format::new()
        .set_bold()
        .set_font_name("Calibri")
        .set_font_size(11);

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (col, width) in column_widths(table).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    Ok(())
}

/// Width per column: longest cell (header included) plus padding, at least
/// [`MIN_COLUMN_WIDTH`].
pub fn column_widths(table: &Table) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = table
                .rows
                .iter()
                .map(|row| row[col].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            (longest + COLUMN_PADDING).max(MIN_COLUMN_WIDTH)
        })
        .collect()
}

/// Read the first worksheet of an artifact back into a table.
pub fn read_artifact(path: &Path) -> Result<Table> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ProcessError::UnreadableInput(format!("{} has no sheets", path.display())))?
        .with_context(|| format!("Failed to read sheet of {}", path.display()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Ok(Table::default()),
    };

    let data = rows.map(|row| row.iter().map(cell_text).collect()).collect();
    Ok(Table::new(headers, data))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
