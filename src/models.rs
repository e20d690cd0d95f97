//! Data models for the alert splitter.
//!
//! This module contains the core data structures shared by the partitioner
//! and the report: the in-memory table, produced artifacts, trend records
//! and the typed errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Typed failures of the processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A column the step depends on is not present in the table.
    #[error("column '{0}' not found")]
    MissingColumn(String),

    /// The input table could not be read or decoded.
    #[error("unreadable input: {0}")]
    UnreadableInput(String),

    /// An artifact could not be written.
    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// There is nothing to process.
    #[error("no data")]
    NoData,

    /// A column with this name is already present.
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
}

/// A rectangular table of text cells, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names, in order.
    pub headers: Vec<String>,
    /// Data rows; every row has exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table, padding or truncating rows to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterates over the cells of one column.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Drops every listed column that is present. Absent names are ignored.
    /// Returns the names actually removed.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let doomed: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| names.contains(h))
            .map(|(i, _)| i)
            .collect();

        if doomed.is_empty() {
            return Vec::new();
        }

        let removed = doomed.iter().map(|&i| self.headers[i].clone()).collect();
        let keep = |i: &usize| !doomed.contains(i);

        self.headers = std::mem::take(&mut self.headers)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, h)| h)
            .collect();

        for row in &mut self.rows {
            *row = std::mem::take(row)
                .into_iter()
                .enumerate()
                .filter(|(i, _)| keep(i))
                .map(|(_, c)| c)
                .collect();
        }

        removed
    }

    /// Inserts a column holding `value` in every row as the first field.
    ///
    /// Fails without touching the table when `name` is already a column.
    pub fn insert_leading_column(&mut self, name: &str, value: &str) -> Result<(), ProcessError> {
        if self.has_column(name) {
            return Err(ProcessError::DuplicateColumn(name.to_string()));
        }
        self.headers.insert(0, name.to_string());
        for row in &mut self.rows {
            row.insert(0, value.to_string());
        }
        Ok(())
    }

    /// Concatenates tables by the union of their columns, in first-seen order.
    /// Cells for columns a table lacks are left empty.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut headers: Vec<String> = Vec::new();
        for table in &tables {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let mapping: Vec<Option<usize>> = headers
                .iter()
                .map(|h| table.column_index(h))
                .collect();
            for row in table.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.map(|i| row[i].clone()).unwrap_or_default())
                        .collect(),
                );
            }
        }

        Table { headers, rows }
    }
}

/// One configured operating-post group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Group identifier, e.g. "PA1".
    pub id: String,
    /// Membership codes matched against the prefix column.
    pub codes: Vec<String>,
}

impl GroupConfig {
    pub fn new(id: &str, codes: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }
}

/// One persisted per-group spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Group identifier the artifact belongs to.
    pub group: String,
    /// Location of the written file.
    pub path: PathBuf,
    /// Number of data rows written.
    pub rows: usize,
}

/// Five-way classification of a group's percentage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    SignificantIncrease,
    ModerateIncrease,
    Stable,
    ModerateDecrease,
    SignificantDecrease,
}

impl TrendLabel {
    /// Classifies a percentage change.
    pub fn classify(pct_change: f64) -> Self {
        if pct_change > 10.0 {
            TrendLabel::SignificantIncrease
        } else if pct_change > 5.0 {
            TrendLabel::ModerateIncrease
        } else if pct_change < -10.0 {
            TrendLabel::SignificantDecrease
        } else if pct_change < -5.0 {
            TrendLabel::ModerateDecrease
        } else {
            TrendLabel::Stable
        }
    }

    /// Display color as RGB.
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            TrendLabel::SignificantIncrease => (0xDC, 0x26, 0x26),
            TrendLabel::ModerateIncrease => (0xEA, 0x58, 0x0C),
            TrendLabel::Stable => (0x37, 0x41, 0x51),
            TrendLabel::ModerateDecrease => (0x05, 0x96, 0x69),
            TrendLabel::SignificantDecrease => (0x16, 0xA3, 0x4A),
        }
    }

    /// Short display marker.
    pub fn icon(&self) -> &'static str {
        match self {
            TrendLabel::SignificantIncrease => "▲",
            TrendLabel::ModerateIncrease => "△",
            TrendLabel::Stable => "=",
            TrendLabel::ModerateDecrease => "▽",
            TrendLabel::SignificantDecrease => "▼",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::SignificantIncrease => write!(f, "AUMENTO SIGNIFICATIVO"),
            TrendLabel::ModerateIncrease => write!(f, "AUMENTO MODERADO"),
            TrendLabel::Stable => write!(f, "ESTÁVEL"),
            TrendLabel::ModerateDecrease => write!(f, "REDUÇÃO MODERADA"),
            TrendLabel::SignificantDecrease => write!(f, "REDUÇÃO SIGNIFICATIVA"),
        }
    }
}

/// Trend of one group's daily alert counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRecord {
    pub group: String,
    /// Second-half mean over first-half mean, in percent.
    pub pct_change: f64,
    pub label: TrendLabel,
    /// Sum of all daily counts.
    pub total: usize,
    /// Mean daily count over the whole series.
    pub mean: f64,
    pub first_half_mean: f64,
    pub second_half_mean: f64,
}

/// Counts of a two-key cross tabulation, rows and columns sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossTab {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `counts[r][c]` is the count for `rows[r]` × `columns[c]`.
    pub counts: Vec<Vec<usize>>,
}

impl CrossTab {
    /// Builds a cross tabulation from (row, column) key pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut cells: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        let mut columns: Vec<String> = Vec::new();

        for (row, col) in pairs {
            *cells.entry(row).or_default().entry(col).or_insert(0) += 1;
            if !columns.iter().any(|c| c == col) {
                columns.push(col.to_string());
            }
        }
        columns.sort();

        let rows: Vec<String> = cells.keys().map(|k| k.to_string()).collect();
        let counts = cells
            .values()
            .map(|by_col| {
                columns
                    .iter()
                    .map(|c| by_col.get(c.as_str()).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        Self {
            rows,
            columns,
            counts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: &str, column: &str) -> usize {
        let r = self.rows.iter().position(|x| x == row);
        let c = self.columns.iter().position(|x| x == column);
        match (r, c) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// Sum of a row across all columns.
    pub fn row_total(&self, row: usize) -> usize {
        self.counts[row].iter().sum()
    }

    /// Largest single cell.
    pub fn max_cell(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// A key with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub key: String,
    pub count: usize,
}
