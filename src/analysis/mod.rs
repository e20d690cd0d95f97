//! Report statistics.
//!
//! Every panel of the composite report is computed here independently and
//! returned as a [`PanelResult`], so one failing panel never hides the
//! others. [`ReportData`] bundles them for rendering and for the JSON
//! summary.

pub mod aggregator;
pub mod trend;

pub use aggregator::AggregationColumns;
pub use trend::{DateFieldStrategy, TrendAnalysis};

use crate::config::Config;
use crate::models::{CrossTab, RankedCount, Table};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single report panel could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum PanelError {
    #[error("coluna '{0}' não encontrada")]
    MissingColumn(String),

    #[error("sem dados: {0}")]
    NoData(String),

    /// The panel's data was fine but drawing it failed.
    #[error("erro ao desenhar: {0}")]
    Draw(String),
}

pub type PanelResult<T> = Result<T, PanelError>;

/// Everything the composite report shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub generated_at: DateTime<Local>,
    /// Rows of the concatenated artifacts.
    pub total_records: usize,
    /// Distinct non-blank group identifiers.
    pub group_count: usize,
    pub categories: PanelResult<CrossTab>,
    pub volume: PanelResult<Vec<RankedCount>>,
    pub drivers: PanelResult<Vec<RankedCount>>,
    pub driver_mix: PanelResult<CrossTab>,
    pub trend: PanelResult<TrendAnalysis>,
}

impl ReportData {
    /// Compute every panel over the concatenated artifact table.
    pub fn compute(table: &Table, config: &Config, now: DateTime<Local>) -> Self {
        let cols = AggregationColumns {
            group: &config.input.group_column,
            category: &config.input.category_column,
            driver: &config.input.driver_column,
            excluded_categories: &config.output.excluded_categories,
        };
        let strategy = DateFieldStrategy::new(config.report.date_columns.clone());

        let categories = aggregator::category_by_group(table, &cols);
        let volume = aggregator::group_volume(table, &cols);
        let drivers = aggregator::top_drivers(table, &cols, config.report.top_drivers);
        let driver_mix = match &drivers {
            Ok(top) => aggregator::driver_category_mix(table, &cols, top),
            Err(e) => Err(e.clone()),
        };
        let trend = trend::analyze(table, cols.group, &strategy, now.date_naive());

        let data = Self {
            generated_at: now,
            total_records: table.len(),
            group_count: count_groups(table, cols.group),
            categories,
            volume,
            drivers,
            driver_mix,
            trend,
        };
        data.log_failures();
        data
    }

    /// Panel names paired with their failure, for those that failed.
    pub fn failures(&self) -> Vec<(&'static str, &PanelError)> {
        [
            ("categories", self.categories.as_ref().err()),
            ("volume", self.volume.as_ref().err()),
            ("drivers", self.drivers.as_ref().err()),
            ("driver_mix", self.driver_mix.as_ref().err()),
            ("trend", self.trend.as_ref().err()),
        ]
        .into_iter()
        .filter_map(|(name, err)| err.map(|e| (name, e)))
        .collect()
    }

    fn log_failures(&self) {
        let failures = self.failures();
        if failures.is_empty() {
            debug!("All report panels computed");
        }
        for (panel, e) in failures {
            warn!("Panel {} unavailable: {}", panel, e);
        }
    }
}

fn count_groups(table: &Table, group_column: &str) -> usize {
    table
        .column(group_column)
        .map(|cells| {
            cells
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .collect::<BTreeSet<_>>()
                .len()
        })
        .unwrap_or(0)
}
