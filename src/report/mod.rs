//! Composite report rendering.
//!
//! Reads the artifacts back, computes [`ReportData`] and draws a header,
//! four panels in a 2×2 grid, a full-width trend panel and a footer into
//! one PNG. A panel whose data or drawing fails is replaced by a
//! placeholder carrying the failure text.

pub mod charts;
pub mod style;

use crate::analysis::{PanelError, PanelResult, ReportData};
use crate::config::Config;
use crate::export;
use crate::models::Table;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use style::ReportStyle;
use tracing::{error, info, warn};

const MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Relative heights of header, panel grid, trend row and footer.
const LAYOUT: [f64; 4] = [0.4, 3.6, 2.0, 0.3];

/// Read every artifact and concatenate them.
///
/// Unreadable artifacts are skipped. Returns `None` when nothing could be
/// read or the result has no rows.
pub fn load_artifacts(paths: &[PathBuf]) -> Option<Table> {
    let tables: Vec<Table> = paths
        .iter()
        .filter_map(|path| match export::read_artifact(path) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                None
            }
        })
        .collect();

    if tables.is_empty() {
        info!("No readable artifacts, nothing to report");
        return None;
    }

    let table = Table::concat(tables);
    if table.is_empty() {
        info!("Artifacts contain no records, nothing to report");
        return None;
    }

    info!("Loaded {} records for the report", table.len());
    Some(table)
}

/// Load the artifacts and compute the report statistics.
pub fn prepare(paths: &[PathBuf], config: &Config) -> Option<ReportData> {
    let table = load_artifacts(paths)?;
    Some(ReportData::compute(&table, config, Local::now()))
}

/// Render the report for `paths`. Returns the image location, or `None`
/// when there is no data or the image could not be written.
pub fn render(paths: &[PathBuf], config: &Config, output: Option<&Path>) -> Option<PathBuf> {
    let data = prepare(paths, config)?;
    render_report(&data, config, output)
}

/// Draw already computed statistics to `output` or the default location.
pub fn render_report(data: &ReportData, config: &Config, output: Option<&Path>) -> Option<PathBuf> {
    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&config.report.filename));

    match draw_report(data, config, &target) {
        Ok(()) => {
            info!("Report saved to {}", target.display());
            Some(target)
        }
        Err(e) => {
            error!("Failed to render report: {:#}", e);
            None
        }
    }
}

fn draw_report(data: &ReportData, config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let style = ReportStyle::new(&config.style, &config.groups).scaled_for(config.report.width);
    let root = BitMapBackend::new(path, (config.report.width, config.report.height)).into_drawing_area();

    compose(&root, data, &config.report.title, &style)?;
    root.present()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Lay out and draw the whole report on `root`.
pub fn compose<DB>(
    root: &DrawingArea<DB, Shift>,
    data: &ReportData,
    title: &str,
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&style.background)?;

    let (_, height) = root.dim_in_pixel();
    let unit = height as f64 / LAYOUT.iter().sum::<f64>();
    let (header, rest) = root.split_vertically((unit * LAYOUT[0]) as i32);
    let (grid, rest) = rest.split_vertically((unit * LAYOUT[1]) as i32);
    let (trend_row, footer) = rest.split_vertically((unit * LAYOUT[2]) as i32);

    charts::draw_header(&header, title, &format_generated_at(&data.generated_at), style)?;

    let gap = style.px(12.0);
    let cells: Vec<_> = grid
        .split_evenly((2, 2))
        .into_iter()
        .map(|cell| cell.margin(gap, gap, gap, gap))
        .collect();

    draw_panel(&cells[0], charts::CATEGORY_TITLE, &data.categories, style, |a, v, s| {
        charts::draw_category_by_group(a, v, s)
    });
    draw_panel(&cells[1], charts::VOLUME_TITLE, &data.volume, style, |a, v, s| {
        charts::draw_group_volume(a, v, s)
    });
    draw_panel(&cells[2], charts::DRIVERS_TITLE, &data.drivers, style, |a, v, s| {
        charts::draw_top_drivers(a, v, s)
    });
    draw_panel(&cells[3], charts::DRIVER_MIX_TITLE, &data.driver_mix, style, |a, v, s| {
        charts::draw_driver_mix(a, v, s)
    });

    let trend_row = trend_row.margin(gap, gap, gap, gap);
    draw_panel(&trend_row, charts::TREND_TITLE, &data.trend, style, |a, v, s| {
        charts::draw_trend(a, v, s)
    });

    charts::draw_footer(&footer, &footer_text(data), style)?;
    Ok(())
}

/// Draw one panel, or its placeholder when the data or the drawing failed.
fn draw_panel<DB, T, F>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    result: &PanelResult<T>,
    style: &ReportStyle,
    draw: F,
) where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
    F: FnOnce(&DrawingArea<DB, Shift>, &T, &ReportStyle) -> Result<()>,
{
    let outcome = match result {
        Ok(value) => draw(area, value, style).map_err(|e| PanelError::Draw(format!("{:#}", e))),
        Err(e) => Err(e.clone()),
    };

    if let Err(e) = outcome {
        if matches!(e, PanelError::Draw(_)) {
            warn!("Panel '{}' could not be drawn: {}", title, e);
        }
        let heading = placeholder_title(title, &e);
        if let Err(e) = charts::draw_placeholder(area, &heading, &e.to_string(), style) {
            error!("Failed to draw placeholder for '{}': {:#}", title, e);
        }
    }
}

/// Panel title with the kind of failure appended.
pub fn placeholder_title(title: &str, error: &PanelError) -> String {
    let suffix = match error {
        PanelError::MissingColumn(_) => "COLUNA NÃO ENCONTRADA",
        PanelError::NoData(_) => "SEM DADOS",
        PanelError::Draw(_) => "ERRO",
    };
    format!("{} - {}", title, suffix)
}

/// `Gerado em 05 de Março de 2024 às 14:30`.
pub fn format_generated_at(at: &DateTime<Local>) -> String {
    format!(
        "Gerado em {:02} de {} de {} às {:02}:{:02}",
        at.day(),
        MONTHS[at.month0() as usize],
        at.year(),
        at.hour(),
        at.minute()
    )
}

pub fn footer_text(data: &ReportData) -> String {
    format!(
        "Sistema de Monitoramento de Alertas | Total de Registros: {} | Postos Analisados: {}",
        data.total_records, data.group_count
    )
}

/// Where the report goes when no location is given: the user's downloads
/// folder, `~/Downloads`, or the current directory, in that order.
pub fn default_output_path(filename: &str) -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupConfig;
    use crate::partition::{self, NoProgress};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_format_generated_at() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        assert_eq!(format_generated_at(&at), "Gerado em 05 de Março de 2024 às 14:07");

        let dec = Local.with_ymd_and_hms(2023, 12, 31, 9, 0, 0).unwrap();
        assert_eq!(format_generated_at(&dec), "Gerado em 31 de Dezembro de 2023 às 09:00");
    }

    #[test]
    fn test_placeholder_title() {
        let e = PanelError::MissingColumn("TIPO".into());
        assert_eq!(
            placeholder_title(charts::CATEGORY_TITLE, &e),
            "DISTRIBUIÇÃO DE ALERTAS POR CATEGORIA E POSTO - COLUNA NÃO ENCONTRADA"
        );
        let e = PanelError::NoData("x".into());
        assert!(placeholder_title("T", &e).ends_with("SEM DADOS"));
    }

    #[test]
    fn test_default_output_path_uses_filename() {
        let path = default_output_path("relatorio.png");
        assert_eq!(path.file_name().unwrap(), "relatorio.png");
    }

    #[test]
    fn test_render_without_readable_artifacts() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.xlsx");
        std::fs::write(&broken, b"not a workbook").unwrap();
        let out = dir.path().join("report.png");

        let paths = vec![broken, dir.path().join("missing.xlsx")];
        assert!(render(&paths, &Config::default(), Some(&out)).is_none());
        assert!(render(&[], &Config::default(), Some(&out)).is_none());
        assert!(!out.exists());
    }

    #[test]
    fn test_load_artifacts_skips_unreadable() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.xlsx");
        let table = Table::new(
            vec!["PA".into(), "TIPO".into()],
            vec![vec!["PA1".into(), "FADIGA".into()]],
        );
        export::write_artifact(&table, &good).unwrap();

        let loaded = load_artifacts(&[dir.path().join("gone.xlsx"), good]).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_load_artifacts_empty_tables() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.xlsx");
        export::write_artifact(&Table::new(vec!["PA".into()], vec![]), &empty).unwrap();
        assert!(load_artifacts(&[empty]).is_none());
    }

    /// 18 rows covering PA1's own codes: one artifact, 18 records, 1 group.
    #[test]
    fn test_single_group_end_to_end() {
        let config = Config::default();
        let others: Vec<&GroupConfig> = config.groups.iter().skip(1).collect();
        let exclusive: Vec<&String> = config.groups[0]
            .codes
            .iter()
            .filter(|code| !others.iter().any(|g| g.contains(code)))
            .collect();
        assert_eq!(exclusive.len(), 17);

        let mut csv = String::from("PREFIXO;TIPO;MOTORISTA;DATA;LATITUDE\n");
        for (i, code) in exclusive.iter().chain(std::iter::once(&exclusive[0])).enumerate() {
            csv.push_str(&format!(
                "{};FADIGA;MOTORISTA {};{:02}/03/2024 08:00:00;-23.5\n",
                code,
                i % 5,
                i % 6 + 1
            ));
        }

        let dir = TempDir::new().unwrap();
        let input = dir.path().join("alertas.csv");
        std::fs::write(&input, csv).unwrap();

        let artifacts = partition::process_file(&input, &config, &NoProgress).artifacts;
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].group, "PA1");
        assert_eq!(artifacts[0].rows, 18);
        let name = artifacts[0].path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("veiculos_pa1_filtrado_"));

        let paths: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
        let data = prepare(&paths, &config).unwrap();
        assert_eq!(data.total_records, 18);
        assert_eq!(data.group_count, 1);
        assert_eq!(footer_text(&data), "Sistema de Monitoramento de Alertas | Total de Registros: 18 | Postos Analisados: 1");

        let table = load_artifacts(&paths).unwrap();
        assert!(!table.has_column("LATITUDE"));
        assert_eq!(table.headers[0], "PA");

        // same artifacts, same statistics
        let again = prepare(&paths, &config).unwrap();
        assert_eq!(data.categories, again.categories);
        assert_eq!(data.drivers, again.drivers);
        assert_eq!(data.trend, again.trend);
    }

    #[test]
    fn test_overlapping_code_reaches_both_groups() {
        let config = Config::default();
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("alertas.csv");
        std::fs::write(&input, "PREFIXO;TIPO\nCL3024;FADIGA\n").unwrap();

        let artifacts = partition::process_file(&input, &config, &NoProgress).artifacts;
        let groups: Vec<&str> = artifacts.iter().map(|a| a.group.as_str()).collect();
        assert_eq!(groups, vec!["PA1", "PA3"]);
    }
}
