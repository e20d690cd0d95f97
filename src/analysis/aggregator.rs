//! Alert aggregation and statistics.
//!
//! This module computes the count-based report panels over the
//! concatenated artifacts: category by group, group volume and the
//! driver rankings.

use super::{PanelError, PanelResult};
use crate::models::{CrossTab, RankedCount, Table};
use std::collections::HashMap;

/// Column names and category exclusions used by the aggregations.
#[derive(Debug, Clone)]
pub struct AggregationColumns<'a> {
    pub group: &'a str,
    pub category: &'a str,
    pub driver: &'a str,
    pub excluded_categories: &'a [String],
}

/// Trimmed, non-blank value of a cell.
fn clean(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn require(table: &Table, column: &str) -> PanelResult<usize> {
    table
        .column_index(column)
        .ok_or_else(|| PanelError::MissingColumn(column.to_string()))
}

/// Cleaned category of a row, if it is usable in the report.
fn usable_category<'t>(row: &'t [String], idx: usize, excluded: &[String]) -> Option<&'t str> {
    clean(&row[idx]).filter(|c| !excluded.iter().any(|e| e.as_str() == *c))
}

/// Count alerts per group and category.
pub fn category_by_group(table: &Table, cols: &AggregationColumns<'_>) -> PanelResult<CrossTab> {
    let group_idx = require(table, cols.group)?;
    let category_idx = require(table, cols.category)?;

    let tab = CrossTab::from_pairs(table.rows.iter().filter_map(|row| {
        let category = usable_category(row, category_idx, cols.excluded_categories)?;
        Some((row[group_idx].as_str(), category))
    }));

    if tab.is_empty() {
        return Err(PanelError::NoData("no valid categories".to_string()));
    }
    Ok(tab)
}

/// Count alerts per group, largest first.
pub fn group_volume(table: &Table, cols: &AggregationColumns<'_>) -> PanelResult<Vec<RankedCount>> {
    let group_idx = require(table, cols.group)?;
    let ranked = rank(table.rows.iter().filter_map(|row| clean(&row[group_idx])));

    if ranked.is_empty() {
        return Err(PanelError::NoData("no groups".to_string()));
    }
    Ok(ranked)
}

/// The `n` drivers with the most alerts, largest first.
pub fn top_drivers(
    table: &Table,
    cols: &AggregationColumns<'_>,
    n: usize,
) -> PanelResult<Vec<RankedCount>> {
    let driver_idx = require(table, cols.driver)?;
    let mut ranked = rank(table.rows.iter().filter_map(|row| clean(&row[driver_idx])));
    ranked.truncate(n);

    if ranked.is_empty() {
        return Err(PanelError::NoData("no valid drivers".to_string()));
    }
    Ok(ranked)
}

/// Category mix of the given drivers, one row per driver.
pub fn driver_category_mix(
    table: &Table,
    cols: &AggregationColumns<'_>,
    drivers: &[RankedCount],
) -> PanelResult<CrossTab> {
    let driver_idx = require(table, cols.driver)?;
    let category_idx = require(table, cols.category)?;

    let tab = CrossTab::from_pairs(table.rows.iter().filter_map(|row| {
        let driver = clean(&row[driver_idx])?;
        if !drivers.iter().any(|d| d.key == driver) {
            return None;
        }
        let category = usable_category(row, category_idx, cols.excluded_categories)?;
        Some((driver, category))
    }));

    if tab.is_empty() {
        return Err(PanelError::NoData(
            "no categories for the top drivers".to_string(),
        ));
    }
    Ok(tab)
}

/// Count keys and order by count descending, then key ascending.
pub fn rank<'a, I>(keys: I) -> Vec<RankedCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }

    let mut ranked: Vec<RankedCount> = counts
        .into_iter()
        .map(|(key, count)| RankedCount {
            key: key.to_string(),
            count,
        })
        .collect();

    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excluded() -> Vec<String> {
        vec!["BOCEJO".to_string()]
    }

    fn table() -> Table {
        let rows = [
            ("PA1", " FADIGA ", "ANA"),
            ("PA1", "FADIGA", "ANA"),
            ("PA1", "CELULAR", "BIA"),
            ("PA2", "FADIGA", "  "),
            ("PA2", "", "CAIO"),
            ("PA2", "BOCEJO", "ANA"),
        ];
        Table::new(
            vec!["PA".into(), "TIPO".into(), "MOTORISTA".into()],
            rows.iter()
                .map(|(g, t, m)| vec![g.to_string(), t.to_string(), m.to_string()])
                .collect(),
        )
    }

    fn with_cols<R>(f: impl FnOnce(&AggregationColumns<'_>) -> R) -> R {
        let excluded = excluded();
        let cols = AggregationColumns {
            group: "PA",
            category: "TIPO",
            driver: "MOTORISTA",
            excluded_categories: &excluded,
        };
        f(&cols)
    }

    #[test]
    fn test_category_by_group_cleans_values() {
        let tab = with_cols(|c| category_by_group(&table(), c)).unwrap();
        assert_eq!(tab.rows, vec!["PA1", "PA2"]);
        assert_eq!(tab.columns, vec!["CELULAR", "FADIGA"]);
        assert_eq!(tab.get("PA1", "FADIGA"), 2);
        assert_eq!(tab.get("PA2", "FADIGA"), 1);
        assert!(!tab.columns.contains(&"BOCEJO".to_string()));
    }

    #[test]
    fn test_category_by_group_missing_column() {
        let mut t = table();
        t.drop_columns(&["TIPO".into()]);
        let err = with_cols(|c| category_by_group(&t, c)).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumn(_)));
    }

    #[test]
    fn test_group_volume() {
        let volume = with_cols(|c| group_volume(&table(), c)).unwrap();
        assert_eq!(volume.len(), 2);
        assert_eq!(volume.iter().map(|r| r.count).sum::<usize>(), 6);
    }

    #[test]
    fn test_top_n_cutoff_and_ties() {
        let keys: Vec<&str> = std::iter::repeat("A")
            .take(10)
            .chain(std::iter::repeat("B").take(10))
            .chain(std::iter::repeat("C").take(5))
            .chain(std::iter::once("D"))
            .collect();
        let mut ranked = rank(keys);
        ranked.truncate(3);

        let names: Vec<&str> = ranked.iter().map(|r| r.key.as_str()).collect();
        assert!(names.contains(&"A"));
        assert!(names.contains(&"B"));
        assert_eq!(names[2], "C");
        assert!(!names.contains(&"D"));
    }

    #[test]
    fn test_top_drivers_skips_blank() {
        let top = with_cols(|c| top_drivers(&table(), c, 7)).unwrap();
        assert_eq!(top[0], RankedCount { key: "ANA".into(), count: 3 });
        assert!(top.iter().all(|r| !r.key.trim().is_empty()));
        assert_eq!(top.len(), 3);

        let top1 = with_cols(|c| top_drivers(&table(), c, 1)).unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[test]
    fn test_driver_category_mix_uses_given_drivers() {
        let drivers = vec![RankedCount { key: "ANA".into(), count: 3 }];
        let mix = with_cols(|c| driver_category_mix(&table(), c, &drivers)).unwrap();
        assert_eq!(mix.rows, vec!["ANA"]);
        assert_eq!(mix.get("ANA", "FADIGA"), 2);
        // excluded category does not show up in the mix
        assert_eq!(mix.columns, vec!["FADIGA"]);
    }

    #[test]
    fn test_driver_category_mix_no_data() {
        let drivers = vec![RankedCount { key: "NINGUEM".into(), count: 1 }];
        let err = with_cols(|c| driver_category_mix(&table(), c, &drivers)).unwrap_err();
        assert!(matches!(err, PanelError::NoData(_)));
    }
}
