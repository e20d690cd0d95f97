//! Panel drawing.
//!
//! Every function draws into the drawing area it is given and works with
//! any plotters backend. Labels that sit under or beside bars are drawn
//! inside the plot, in a band of negative coordinates, so they are never
//! clipped by the label areas.

use super::style::ReportStyle;
use crate::analysis::trend::{DateSource, TrendAnalysis};
use crate::models::{CrossTab, RankedCount};
use anyhow::Result;
use chrono::Duration;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::{FRAC_PI_2, TAU};

pub const CATEGORY_TITLE: &str = "DISTRIBUIÇÃO DE ALERTAS POR CATEGORIA E POSTO";
pub const VOLUME_TITLE: &str = "VOLUME TOTAL DE ALERTAS POR POSTO";
pub const DRIVERS_TITLE: &str = "TOP MOTORISTAS COM MAIS ALERTAS";
pub const DRIVER_MIX_TITLE: &str = "TIPOS DE ALERTAS DOS TOP MOTORISTAS";
pub const TREND_TITLE: &str = "ANÁLISE TEMPORAL DE INCIDENTES POR PA";

/// Headroom above the tallest bar.
const HEADROOM: f64 = 1.15;

/// Share of the value range reserved below zero for bar labels.
const LABEL_BAND: f64 = 0.08;

fn centered() -> Pos {
    Pos::new(HPos::Center, VPos::Center)
}

/// Shorten `name` to `max` characters, marking the cut with "...".
pub fn truncate_label(name: &str, max: usize) -> String {
    if name.chars().count() > max {
        format!("{}...", name.chars().take(max).collect::<String>())
    } else {
        name.to_string()
    }
}

fn hide_negative(v: &f64) -> String {
    if *v < 0.0 {
        String::new()
    } else {
        format!("{:.0}", v)
    }
}

/// Title band across the top of the report.
pub fn draw_header<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    generated: &str,
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let x = w as i32 / 2;

    area.draw(&Text::new(
        title.to_string(),
        (x, h as i32 * 2 / 5),
        style.font(22.0, true).color(&style.text).pos(centered()),
    ))?;
    area.draw(&Text::new(
        generated.to_string(),
        (x, h as i32 * 4 / 5),
        style.font(12.0, false).color(&style.muted).pos(centered()),
    ))?;
    Ok(())
}

/// Statistics band across the bottom of the report.
pub fn draw_footer<DB>(area: &DrawingArea<DB, Shift>, text: &str, style: &ReportStyle) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let inset = style.px(8.0);

    area.draw(&Rectangle::new(
        [(inset, inset), (w as i32 - inset, h as i32 - inset)],
        style.muted.stroke_width(1),
    ))?;
    area.draw(&Text::new(
        text.to_string(),
        (w as i32 / 2, h as i32 / 2),
        style.font(10.0, true).color(&style.text).pos(centered()),
    ))?;
    Ok(())
}

/// Panel shown in place of a chart that could not be produced.
pub fn draw_placeholder<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    message: &str,
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    area.fill(&style.background)?;
    let body = area.titled(title, style.font(14.0, true))?;
    let (w, h) = body.dim_in_pixel();
    let (cx, cy) = (w as i32 / 2, h as i32 / 2);
    let half_w = (w as i32 / 3).max(style.px(60.0));
    let half_h = style.px(24.0);

    body.draw(&Rectangle::new(
        [(cx - half_w, cy - half_h), (cx + half_w, cy + half_h)],
        style.muted.stroke_width(2),
    ))?;
    body.draw(&Text::new(
        message.to_string(),
        (cx, cy),
        style.font(12.0, true).color(&style.text).pos(centered()),
    ))?;
    Ok(())
}

/// Grouped bars: one slot per group, one bar per category.
pub fn draw_category_by_group<DB>(
    area: &DrawingArea<DB, Shift>,
    tab: &CrossTab,
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let y_max = tab.max_cell().max(1) as f64 * HEADROOM;
    let band = y_max * LABEL_BAND;

    let mut chart = ChartBuilder::on(area)
        .caption(CATEGORY_TITLE, style.font(16.0, true))
        .margin(style.px(15.0))
        .x_label_area_size(style.px(10.0))
        .y_label_area_size(style.px(50.0))
        .build_cartesian_2d(0.0..tab.rows.len() as f64, -band..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_x_axis()
        .y_desc("Quantidade de Alertas")
        .y_label_formatter(&hide_negative)
        .label_style(style.font(10.0, false))
        .axis_desc_style(style.font(12.0, true))
        .draw()?;

    let slot = 0.7 / tab.columns.len().max(1) as f64;
    for (c, category) in tab.columns.iter().enumerate() {
        let color = style.category_color(category, c);
        chart
            .draw_series(tab.rows.iter().enumerate().map(|(g, group)| {
                let x0 = g as f64 + 0.15 + slot * c as f64;
                let count = tab.get(group, category) as f64;
                Rectangle::new([(x0, 0.0), (x0 + slot, count)], color.filled())
            }))?
            .label(category.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], color.filled()));
    }

    let label_style = style.font(11.0, true).color(&style.text).pos(centered());
    chart.draw_series(tab.rows.iter().enumerate().map(|(g, group)| {
        Text::new(group.clone(), (g as f64 + 0.5, -band / 2.0), label_style.clone())
    }))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(style.muted)
        .label_font(style.font(9.0, false))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

/// Ring chart of each group's share with the total in the middle.
pub fn draw_group_volume<DB>(
    area: &DrawingArea<DB, Shift>,
    volume: &[RankedCount],
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let body = area.titled(VOLUME_TITLE, style.font(16.0, true))?;
    let (w, h) = body.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let outer = w.min(h) as f64 * 0.36;
    let inner = outer * 0.55;
    let total: usize = volume.iter().map(|r| r.count).sum();
    if total == 0 {
        anyhow::bail!("volume total is zero");
    }

    let mut start = -FRAC_PI_2;
    for (i, entry) in volume.iter().enumerate() {
        let share = entry.count as f64 / total as f64;
        let sweep = share * TAU;
        let mid = start + sweep / 2.0;
        let color = style.group_color(&entry.key, i);

        body.draw(&Polygon::new(
            ring_segment(center, inner, outer, start, start + sweep),
            color.filled(),
        ))?;
        body.draw(&Text::new(
            format!("{:.1}%", share * 100.0),
            polar(center, (inner + outer) / 2.0, mid),
            style.font(10.0, true).color(&WHITE).pos(centered()),
        ))?;
        body.draw(&Text::new(
            format!("{} ({})", entry.key, entry.count),
            polar(center, outer * 1.18, mid),
            style.font(11.0, true).color(&color).pos(centered()),
        ))?;

        start += sweep;
    }

    let line = style.px(18.0);
    for (offset, text) in [(-line, "TOTAL".to_string()), (0, total.to_string()), (line, "Alertas".to_string())] {
        body.draw(&Text::new(
            text,
            (center.0, center.1 + offset),
            style.font(14.0, true).color(&style.highlight).pos(centered()),
        ))?;
    }

    Ok(())
}

/// Point on a circle around `center`, in pixels. Angle 0 points right.
fn polar(center: (i32, i32), radius: f64, angle: f64) -> (i32, i32) {
    (
        center.0 + (radius * angle.cos()).round() as i32,
        center.1 + (radius * angle.sin()).round() as i32,
    )
}

/// Outline of a ring slice between angles `from` and `to`.
fn ring_segment(center: (i32, i32), inner: f64, outer: f64, from: f64, to: f64) -> Vec<(i32, i32)> {
    let steps = (((to - from) / TAU) * 180.0).ceil().max(2.0) as usize;
    let angle = |k: usize| from + (to - from) * k as f64 / steps as f64;

    let mut points: Vec<(i32, i32)> = (0..=steps).map(|k| polar(center, outer, angle(k))).collect();
    points.extend((0..=steps).rev().map(|k| polar(center, inner, angle(k))));
    points
}

/// Horizontal ranking, largest on top and highlighted.
pub fn draw_top_drivers<DB>(
    area: &DrawingArea<DB, Shift>,
    drivers: &[RankedCount],
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = drivers.len();
    let x_max = drivers.iter().map(|d| d.count).max().unwrap_or(1).max(1) as f64 * HEADROOM;
    let name_band = x_max * 0.45;
    let title = format!("TOP {} MOTORISTAS COM MAIS ALERTAS", n);

    let mut chart = ChartBuilder::on(area)
        .caption(title, style.font(16.0, true))
        .margin(style.px(15.0))
        .x_label_area_size(style.px(40.0))
        .y_label_area_size(style.px(5.0))
        .build_cartesian_2d(-name_band..x_max, 0.0..n as f64)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .x_desc("Número de Alertas")
        .x_label_formatter(&hide_negative)
        .label_style(style.font(9.0, false))
        .axis_desc_style(style.font(12.0, true))
        .draw()?;

    for (rank, driver) in drivers.iter().enumerate() {
        let y = (n - rank) as f64 - 0.5;
        let color = if rank == 0 { style.highlight } else { style.muted };
        let count = driver.count as f64;

        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, y - 0.25), (count, y + 0.25)],
            color.filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            truncate_label(&driver.key, 20),
            (-x_max * 0.02, y),
            style
                .font(9.0, false)
                .color(&style.text)
                .pos(Pos::new(HPos::Right, VPos::Center)),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            driver.count.to_string(),
            (count + x_max * 0.02, y),
            style
                .font(10.0, true)
                .color(&color)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        )))?;
    }

    Ok(())
}

/// Stacked category bars, one per driver.
pub fn draw_driver_mix<DB>(area: &DrawingArea<DB, Shift>, mix: &CrossTab, style: &ReportStyle) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let tallest = (0..mix.rows.len()).map(|r| mix.row_total(r)).max().unwrap_or(1);
    let y_max = tallest.max(1) as f64 * HEADROOM;
    let band = y_max * LABEL_BAND;

    let mut chart = ChartBuilder::on(area)
        .caption(DRIVER_MIX_TITLE, style.font(16.0, true))
        .margin(style.px(15.0))
        .x_label_area_size(style.px(10.0))
        .y_label_area_size(style.px(50.0))
        .build_cartesian_2d(0.0..mix.rows.len() as f64, -band..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_x_axis()
        .y_desc("Número de Alertas")
        .y_label_formatter(&hide_negative)
        .label_style(style.font(9.0, false))
        .axis_desc_style(style.font(12.0, true))
        .draw()?;

    let mut bottoms = vec![0usize; mix.rows.len()];
    for (c, category) in mix.columns.iter().enumerate() {
        let color = style.category_color(category, c);
        let bars: Vec<_> = mix
            .counts
            .iter()
            .enumerate()
            .map(|(d, counts)| {
                let (low, high) = (bottoms[d], bottoms[d] + counts[c]);
                bottoms[d] = high;
                Rectangle::new(
                    [(d as f64 + 0.25, low as f64), (d as f64 + 0.75, high as f64)],
                    color.filled(),
                )
            })
            .collect();

        chart
            .draw_series(bars)?
            .label(category.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], color.filled()));
    }

    let label_style = style.font(8.0, false).color(&style.text).pos(centered());
    chart.draw_series(mix.rows.iter().enumerate().map(|(d, driver)| {
        Text::new(truncate_label(driver, 10), (d as f64 + 0.5, -band / 2.0), label_style.clone())
    }))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(style.muted)
        .label_font(style.font(9.0, false))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

/// Daily counts per group with a trend summary box on the right.
pub fn draw_trend<DB>(
    area: &DrawingArea<DB, Shift>,
    trend: &TrendAnalysis,
    style: &ReportStyle,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let first = trend
        .series
        .iter()
        .filter_map(|s| s.points.first().map(|(d, _)| *d))
        .min()
        .ok_or_else(|| anyhow::anyhow!("no dated series"))?;
    let last = trend
        .series
        .iter()
        .filter_map(|s| s.points.last().map(|(d, _)| *d))
        .max()
        .unwrap_or(first);
    let span = (last - first).num_days().max(1) as f64;
    let y_max = trend
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, c)| *c))
        .max()
        .unwrap_or(1)
        .max(1) as f64
        * 1.2;

    let (w, _) = area.dim_in_pixel();
    let (plot, side) = area.split_horizontally(w as i32 * 4 / 5);

    let mut chart = ChartBuilder::on(&plot)
        .caption(TREND_TITLE, style.font(18.0, true))
        .margin(style.px(15.0))
        .x_label_area_size(style.px(45.0))
        .y_label_area_size(style.px(50.0))
        .build_cartesian_2d(-0.5..span + 0.5, 0.0..y_max)?;

    let day_label = |v: &f64| (first + Duration::days(v.round() as i64)).format("%d/%m").to_string();
    chart
        .configure_mesh()
        .x_labels((span as usize + 1).min(12))
        .x_label_formatter(&day_label)
        .y_desc("Quantidade de Alertas por Dia")
        .x_desc("Período de Análise")
        .label_style(style.font(10.0, false))
        .axis_desc_style(style.font(13.0, true))
        .draw()?;

    for (i, series) in trend.series.iter().enumerate() {
        let color = style.group_color(&series.group, i);
        let points: Vec<(f64, f64)> = series
            .points
            .iter()
            .map(|(day, count)| ((*day - first).num_days() as f64, *count as f64))
            .collect();

        let legend = match trend.trend_for(&series.group) {
            Some(t) => format!("{} {} ({:+.1}%)", series.group, t.label.icon(), t.pct_change),
            None => series.group.clone(),
        };

        chart
            .draw_series(
                AreaSeries::new(points.iter().copied(), 0.0, color.mix(0.2))
                    .border_style(color.stroke_width(3)),
            )?
            .label(legend)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 5, color.filled())))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.9))
        .border_style(style.muted)
        .label_font(style.font(10.0, false))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    draw_trend_summary(&side, trend, style)
}

fn draw_trend_summary<DB>(area: &DrawingArea<DB, Shift>, trend: &TrendAnalysis, style: &ReportStyle) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut lines: Vec<(String, RGBColor)> = vec![("RESUMO DE TENDÊNCIAS:".to_string(), style.text)];
    for t in &trend.trends {
        let (r, g, b) = t.label.color();
        lines.push((
            format!("{} {}: {} ({:+.1}%)", t.label.icon(), t.group, t.label, t.pct_change),
            RGBColor(r, g, b),
        ));
    }
    if trend.trends.is_empty() {
        lines.push(("Dados insuficientes".to_string(), style.muted));
    }
    if trend.source == DateSource::Synthetic {
        lines.push(("Datas sintéticas".to_string(), style.muted));
    }
    if trend.dropped_rows > 0 {
        lines.push((format!("{} registros sem data válida", trend.dropped_rows), style.muted));
    }

    let (w, _) = area.dim_in_pixel();
    let pad = style.px(10.0);
    let line = style.px(20.0);
    let top = style.px(60.0);
    let bottom = top + pad * 2 + line * lines.len() as i32;

    area.draw(&Rectangle::new(
        [(pad, top), (w as i32 - pad, bottom)],
        style.highlight.stroke_width(2),
    ))?;
    for (i, (text, color)) in lines.into_iter().enumerate() {
        area.draw(&Text::new(
            text,
            (pad * 2, top + pad + line * i as i32),
            style
                .font(9.0, i == 0)
                .color(&color)
                .pos(Pos::new(HPos::Left, VPos::Top)),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("ANA", 10), "ANA");
        assert_eq!(truncate_label("JOÃO DA SILVA SAURO", 10), "JOÃO DA SI...");
        assert_eq!(truncate_label("ABCDEFGHIJ", 10), "ABCDEFGHIJ");
    }

    #[test]
    fn test_hide_negative() {
        assert_eq!(hide_negative(&-1.0), "");
        assert_eq!(hide_negative(&12.0), "12");
    }

    #[test]
    fn test_polar() {
        assert_eq!(polar((100, 100), 10.0, 0.0), (110, 100));
        assert_eq!(polar((100, 100), 10.0, -FRAC_PI_2), (100, 90));
    }

    #[test]
    fn test_ring_segment_closes_on_inner_arc() {
        let points = ring_segment((0, 0), 5.0, 10.0, 0.0, FRAC_PI_2);
        assert_eq!(points.first(), Some(&(10, 0)));
        assert_eq!(points.last(), Some(&(5, 0)));
        assert_eq!(points.len() % 2, 0);
    }
}
