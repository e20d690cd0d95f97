//! Temporal trend analysis.
//!
//! Daily alert counts per group, split into two halves to measure whether
//! a group's volume is rising or falling.

use super::{PanelError, PanelResult};
use crate::models::{Table, TrendLabel, TrendRecord};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Datetime layouts accepted for date cells, tried in order.
///
/// Two-digit years come before four-digit ones: `%Y` also accepts `24`.
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Date-only layouts, tried after the datetime ones.
const DATE_FORMATS: &[&str] = &["%d/%m/%y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Dates before this year are misparsed short years, not real alerts.
const MIN_YEAR: i32 = 1900;

/// Ordered list of candidate date columns; the first one present wins.
#[derive(Debug, Clone)]
pub struct DateFieldStrategy {
    candidates: Vec<String>,
}

impl DateFieldStrategy {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    /// The first candidate that is a column of `table`.
    pub fn locate<'a>(&'a self, table: &Table) -> Option<&'a str> {
        self.candidates
            .iter()
            .find(|c| table.has_column(c))
            .map(String::as_str)
    }
}

/// Where the dates of the trend panel came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum DateSource {
    /// Parsed from this column.
    Column(String),
    /// One synthetic day per row, ending today.
    Synthetic,
}

/// One group's daily counts, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSeries {
    pub group: String,
    pub points: Vec<(NaiveDate, usize)>,
}

/// Result of the temporal analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub source: DateSource,
    /// Rows dropped because their date did not parse.
    pub dropped_rows: usize,
    pub series: Vec<GroupSeries>,
    /// One record per group with at least two days of data.
    pub trends: Vec<TrendRecord>,
}

impl TrendAnalysis {
    pub fn trend_for(&self, group: &str) -> Option<&TrendRecord> {
        self.trends.iter().find(|t| t.group == group)
    }
}

/// Parse a date cell. Accepts the layouts above and RFC 3339.
///
/// Years before 1900 are rejected.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        });

    parsed.filter(|d| d.year() >= MIN_YEAR)
}

/// Percentage change of the second half's mean over the first half's.
///
/// The series is split at `len / 2`. A zero first-half mean gives zero.
/// Returns `None` for series shorter than two points.
pub fn compute_trend(group: &str, counts: &[usize]) -> Option<TrendRecord> {
    if counts.len() < 2 {
        return None;
    }

    let mid = counts.len() / 2;
    let first_half_mean = mean(&counts[..mid]);
    let second_half_mean = mean(&counts[mid..]);

    let pct_change = if first_half_mean > 0.0 {
        (second_half_mean - first_half_mean) / first_half_mean * 100.0
    } else {
        0.0
    };

    Some(TrendRecord {
        group: group.to_string(),
        pct_change,
        label: TrendLabel::classify(pct_change),
        total: counts.iter().sum(),
        mean: mean(counts),
        first_half_mean,
        second_half_mean,
    })
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

/// Bucket rows by (group, day) and compute each group's trend.
///
/// Without a date column every row gets a synthetic date, starting
/// `rows` days before `today`, so the panel still renders.
pub fn analyze(
    table: &Table,
    group_column: &str,
    strategy: &DateFieldStrategy,
    today: NaiveDate,
) -> PanelResult<TrendAnalysis> {
    let group_idx = table
        .column_index(group_column)
        .ok_or_else(|| PanelError::MissingColumn(group_column.to_string()))?;

    let (source, dated): (DateSource, Vec<(&str, NaiveDate)>) = match strategy.locate(table) {
        Some(column) => {
            debug!("Using date column {}", column);
            let idx = table
                .column_index(column)
                .ok_or_else(|| PanelError::MissingColumn(column.to_string()))?;
            let dated = table
                .rows
                .iter()
                .filter_map(|row| parse_date(&row[idx]).map(|d| (row[group_idx].as_str(), d)))
                .collect();
            (DateSource::Column(column.to_string()), dated)
        }
        None => {
            info!("No date column found, using synthetic dates");
            let start = today - Duration::days(table.len() as i64);
            let dated = table
                .rows
                .iter()
                .enumerate()
                .map(|(i, row)| (row[group_idx].as_str(), start + Duration::days(i as i64)))
                .collect();
            (DateSource::Synthetic, dated)
        }
    };

    let dropped_rows = table.len() - dated.len();
    if dated.is_empty() {
        return Err(PanelError::NoData("no parseable dates".to_string()));
    }

    let mut buckets: BTreeMap<&str, BTreeMap<NaiveDate, usize>> = BTreeMap::new();
    for (group, day) in dated {
        *buckets.entry(group).or_default().entry(day).or_insert(0) += 1;
    }

    let series: Vec<GroupSeries> = buckets
        .into_iter()
        .map(|(group, days)| GroupSeries {
            group: group.to_string(),
            points: days.into_iter().collect(),
        })
        .collect();

    let trends = series
        .iter()
        .filter_map(|s| {
            let counts: Vec<usize> = s.points.iter().map(|(_, c)| *c).collect();
            compute_trend(&s.group, &counts)
        })
        .collect();

    Ok(TrendAnalysis {
        source,
        dropped_rows,
        series,
        trends,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn strategy() -> DateFieldStrategy {
        DateFieldStrategy::new(vec!["DATA".into(), "Date".into(), "DATA_ALERTA".into()])
    }

    #[test]
    fn test_strategy_first_present_wins() {
        let table = Table::new(vec!["DATA_ALERTA".into(), "Date".into()], vec![]);
        assert_eq!(strategy().locate(&table), Some("Date"));

        let none = Table::new(vec!["OUTRA".into()], vec![]);
        assert_eq!(strategy().locate(&none), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("05/03/2024 14:22:10"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 08:00:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T08:00:00-03:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("ontem"), None);
        assert_eq!(parse_date("  "), None);
    }

    #[test]
    fn test_parse_date_minute_precision() {
        assert_eq!(parse_date("2024-03-05 08:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T08:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05-03-2024 08:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024 08:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05 08:00"), Some(day(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_two_digit_years() {
        assert_eq!(parse_date("05/03/24"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05/03/24 08:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), Some(day(2024, 3, 5)));
        // short years in other layouts are dropped, never read as year 24
        assert_eq!(parse_date("05-03-24"), None);
        assert_eq!(parse_date("24-03-05"), None);
    }

    #[test]
    fn test_analyze_mixed_year_widths_share_one_series() {
        let table = Table::new(
            vec!["PA".into(), "DATA".into()],
            vec![
                vec!["PA1".into(), "2024-03-01 08:00".into()],
                vec!["PA1".into(), "02/03/24".into()],
                vec!["PA1".into(), "03/03/2024".into()],
            ],
        );
        let analysis = analyze(&table, "PA", &strategy(), day(2024, 3, 10)).unwrap();
        assert_eq!(analysis.dropped_rows, 0);
        let days: Vec<NaiveDate> = analysis.series[0].points.iter().map(|(d, _)| *d).collect();
        assert_eq!(days, vec![day(2024, 3, 1), day(2024, 3, 2), day(2024, 3, 3)]);
    }

    #[test]
    fn test_compute_trend_increase() {
        let t = compute_trend("PA1", &[10, 10, 12, 12]).unwrap();
        assert!((t.pct_change - 20.0).abs() < 1e-9);
        assert_eq!(t.label, TrendLabel::SignificantIncrease);
        assert_eq!(t.total, 44);
        assert!((t.mean - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_trend_odd_length_split() {
        // mid = 1: first half [20], second half [19, 18]
        let t = compute_trend("PA2", &[20, 19, 18]).unwrap();
        assert!((t.pct_change + 7.5).abs() < 1e-9);
        assert_eq!(t.label, TrendLabel::ModerateDecrease);
    }

    #[test]
    fn test_compute_trend_zero_first_half() {
        let t = compute_trend("PA3", &[0, 5]).unwrap();
        assert_eq!(t.pct_change, 0.0);
        assert_eq!(t.label, TrendLabel::Stable);
    }

    #[test]
    fn test_compute_trend_too_short() {
        assert!(compute_trend("PA4", &[3]).is_none());
        assert!(compute_trend("PA4", &[]).is_none());
    }

    #[test]
    fn test_analyze_buckets_by_group_and_day() {
        let rows = [
            ("PA1", "01/03/2024 08:00:00"),
            ("PA1", "01/03/2024 17:00:00"),
            ("PA1", "02/03/2024 09:00:00"),
            ("PA2", "01/03/2024 10:00:00"),
            ("PA2", "invalida"),
        ];
        let table = Table::new(
            vec!["PA".into(), "DATA".into()],
            rows.iter()
                .map(|(g, d)| vec![g.to_string(), d.to_string()])
                .collect(),
        );

        let analysis = analyze(&table, "PA", &strategy(), day(2024, 3, 10)).unwrap();
        assert_eq!(analysis.source, DateSource::Column("DATA".into()));
        assert_eq!(analysis.dropped_rows, 1);
        assert_eq!(analysis.series.len(), 2);
        assert_eq!(
            analysis.series[0].points,
            vec![(day(2024, 3, 1), 2), (day(2024, 3, 2), 1)]
        );

        // PA1 halves: [2] vs [1] -> -50%
        let pa1 = analysis.trend_for("PA1").unwrap();
        assert_eq!(pa1.label, TrendLabel::SignificantDecrease);
        // PA2 has a single day and gets no trend record
        assert!(analysis.trend_for("PA2").is_none());
    }

    #[test]
    fn test_analyze_synthesizes_dates() {
        let table = Table::new(
            vec!["PA".into()],
            (0..4).map(|_| vec!["PA1".to_string()]).collect(),
        );
        let today = day(2024, 3, 10);
        let analysis = analyze(&table, "PA", &strategy(), today).unwrap();

        assert_eq!(analysis.source, DateSource::Synthetic);
        assert_eq!(analysis.series[0].points.len(), 4);
        assert_eq!(analysis.series[0].points[0].0, day(2024, 3, 6));
        assert_eq!(analysis.trend_for("PA1").unwrap().label, TrendLabel::Stable);
    }

    #[test]
    fn test_analyze_all_dates_invalid() {
        let table = Table::new(
            vec!["PA".into(), "DATA".into()],
            vec![vec!["PA1".into(), "x".into()]],
        );
        let err = analyze(&table, "PA", &strategy(), day(2024, 3, 10)).unwrap_err();
        assert!(matches!(err, PanelError::NoData(_)));
    }
}
