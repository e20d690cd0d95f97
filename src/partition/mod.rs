//! Group partitioner.
//!
//! Splits the input table into one subset per configured group, prunes
//! configured columns, labels every row with its group and persists each
//! non-empty subset as a spreadsheet.

pub mod progress;

pub use progress::{NoProgress, ProgressBarObserver, ProgressObserver};

use crate::config::Config;
use crate::export;
use crate::input;
use crate::models::{GroupConfig, OutputArtifact, ProcessError, Table};
use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;
use tracing::{debug, error, info};

/// Column names the filter depends on.
#[derive(Debug, Clone)]
pub struct FilterColumns<'a> {
    pub prefix: &'a str,
    pub category: &'a str,
    pub group: &'a str,
}

impl<'a> From<&'a Config> for FilterColumns<'a> {
    fn from(config: &'a Config) -> Self {
        Self {
            prefix: &config.input.prefix_column,
            category: &config.input.category_column,
            group: &config.input.group_column,
        }
    }
}

/// Produce one group's subset of `table`.
///
/// Keeps rows whose prefix is in the group's code set, drops excluded
/// categories when the category column exists, removes every listed column
/// that is present and inserts the group identifier as the first column.
pub fn filter_group(
    table: &Table,
    group: &GroupConfig,
    excluded: &[String],
    removed: &[String],
    columns: &FilterColumns<'_>,
) -> Result<Table, ProcessError> {
    let prefix_idx = table
        .column_index(columns.prefix)
        .ok_or_else(|| ProcessError::MissingColumn(columns.prefix.to_string()))?;
    let category_idx = table.column_index(columns.category);

    let mut subset = Table {
        headers: table.headers.clone(),
        rows: table
            .rows
            .iter()
            .filter(|row| group.contains(&row[prefix_idx]))
            .filter(|row| match category_idx {
                Some(idx) => !excluded.contains(&row[idx]),
                None => true,
            })
            .cloned()
            .collect(),
    };

    let dropped = subset.drop_columns(removed);
    if !dropped.is_empty() {
        debug!("{}: removed columns {:?}", group.id, dropped);
    }

    subset.insert_leading_column(columns.group, &group.id)?;
    Ok(subset)
}

/// Split `table` by every group, in order, keeping only non-empty results.
///
/// A group whose filter fails is logged and skipped.
pub fn partition(
    table: &Table,
    groups: &[GroupConfig],
    excluded: &[String],
    removed: &[String],
    columns: &FilterColumns<'_>,
) -> Vec<(String, Table)> {
    groups
        .iter()
        .filter_map(|group| match filter_group(table, group, excluded, removed, columns) {
            Ok(subset) if subset.is_empty() => None,
            Ok(subset) => Some((group.id.clone(), subset)),
            Err(e) => {
                error!("Failed to process {}: {}", group.id, e);
                None
            }
        })
        .collect()
}

/// What one partitioner run produced.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    /// Artifacts written, in group order. May be empty.
    pub artifacts: Vec<OutputArtifact>,
    /// Why the run stopped before any group ran, if it did.
    pub failure: Option<String>,
}

/// Read `path`, write one artifact per non-empty group and report progress.
///
/// An unreadable input yields no artifacts and a `failure`; a failing group
/// is logged and the next one runs.
pub fn process_file(
    path: &Path,
    config: &Config,
    observer: &dyn ProgressObserver,
) -> ProcessOutcome {
    match try_process_file(path, config, observer) {
        Ok(artifacts) => ProcessOutcome {
            artifacts,
            failure: None,
        },
        Err(e) => {
            error!("Processing of {} failed: {:#}", path.display(), e);
            ProcessOutcome {
                artifacts: Vec::new(),
                failure: Some(format!("{:#}", e)),
            }
        }
    }
}

fn try_process_file(
    path: &Path,
    config: &Config,
    observer: &dyn ProgressObserver,
) -> Result<Vec<OutputArtifact>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Processing file: {}", file_name);

    let table = input::read_table(path, &config.input)?;
    info!("Loaded {} records", table.len());

    let out_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&config.output.folder);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let columns = FilterColumns::from(config);
    let mut parts = partition(
        &table,
        &config.groups,
        &config.output.excluded_categories,
        &config.output.removed_columns,
        &columns,
    )
    .into_iter()
    .peekable();

    let total = config.groups.len();
    let mut artifacts = Vec::new();

    for (i, group) in config.groups.iter().enumerate() {
        info!("Processing {}... ({}/{})", group.id, i + 1, total);

        match parts.next_if(|(id, _)| *id == group.id) {
            Some((_, subset)) => match write_group(&group.id, &subset, &out_dir) {
                Ok(artifact) => {
                    info!("{}: {} records saved", group.id, artifact.rows);
                    artifacts.push(artifact);
                }
                Err(e) => error!("Failed to save {}: {:#}", group.id, e),
            },
            None => info!("No data found for {}", group.id),
        }

        progress::notify(observer, (i + 1) as f64 / total as f64);
    }

    info!("Processing complete: {} files generated", artifacts.len());
    Ok(artifacts)
}

fn write_group(group: &str, subset: &Table, out_dir: &Path) -> Result<OutputArtifact> {
    let path = export::unique_artifact_path(out_dir, group, Local::now());
    export::write_artifact(subset, &path)?;

    Ok(OutputArtifact {
        group: group.to_string(),
        path,
        rows: subset.len(),
    })
}
