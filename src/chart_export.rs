//! Chart export to PNG (plotters bitmap) and SVG (plotters svg), plus a
//! JSON manifest describing a whole-dashboard export.

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chart_data::{
    BinnedCounts, BoxChart, CategoryCounts, Chart, ScatterCloud, ViolinChart,
};
use crate::chart_spec::{BarMode, ChartSpec};
use crate::error::{DashboardError, Result};
use crate::session::Session;
use crate::ExportFormat;

pub const MANIFEST_FILE: &str = "manifest.json";

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(214, 39, 40),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(23, 190, 207),
];

fn series_color(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Image settings for one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
    /// Rotation of 3-D plots around the vertical axis, in radians.
    pub yaw: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            width: 1024,
            height: 640,
            yaw: 0.5,
        }
    }
}

/// `<NN>-<id>.<ext>`, numbered from 1 in catalog order.
pub fn chart_file_name(position: usize, id: &str, format: ExportFormat) -> String {
    format!("{:02}-{}.{}", position + 1, id, format.extension())
}

/// Draw one chart into an image file.
pub fn write_chart(
    path: &Path,
    spec: &ChartSpec,
    chart: &Chart,
    options: &ExportOptions,
) -> Result<()> {
    let size = (options.width, options.height);
    let drawn = match options.format {
        ExportFormat::Png => draw(
            BitMapBackend::new(path, size).into_drawing_area(),
            spec,
            chart,
            options.yaw,
        ),
        ExportFormat::Svg => draw(
            SVGBackend::new(path, size).into_drawing_area(),
            spec,
            chart,
            options.yaw,
        ),
    };
    drawn.map_err(|e| DashboardError::export(path, e))
}

fn draw<DB>(root: DrawingArea<DB, Shift>, spec: &ChartSpec, chart: &Chart, yaw: f64) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let area = root.titled(&spec.title, ("sans-serif", 24))?;

    if chart.is_empty() {
        area.draw(&Text::new(
            "No rows match the current filters",
            (40, 40),
            ("sans-serif", 18).into_font().color(&BLACK.mix(0.6)),
        ))?;
    } else {
        match chart {
            Chart::Bars(bars) => draw_bars(&area, bars)?,
            Chart::Histogram(hist) => draw_histogram(&area, hist)?,
            Chart::Box(boxes) => draw_boxes(&area, boxes)?,
            Chart::Violin(violins) => draw_violins(&area, violins)?,
            Chart::Scatter3d(cloud) => draw_cloud(&area, cloud, yaw)?,
        }
    }

    root.present()?;
    Ok(())
}

/// Bar rectangles for `counts[group][slot]`, given each slot's horizontal
/// extent. Stacked bars share the slot; grouped bars split it evenly.
pub(crate) fn bar_rects(
    counts: &[Vec<u64>],
    slots: &[(f64, f64)],
    mode: BarMode,
) -> Vec<Vec<[(f64, f64); 2]>> {
    let groups = counts.len().max(1) as f64;
    let mut base = vec![0.0; slots.len()];
    let mut out = Vec::with_capacity(counts.len());
    for (gi, row) in counts.iter().enumerate() {
        let mut rects = Vec::with_capacity(slots.len());
        for (si, (count, (lo, hi))) in row.iter().zip(slots).enumerate() {
            let count = *count as f64;
            rects.push(match mode {
                BarMode::Stacked => {
                    let y0 = base[si];
                    base[si] += count;
                    [(*lo, y0), (*hi, y0 + count)]
                }
                BarMode::Grouped => {
                    let width = (hi - lo) / groups;
                    let x0 = lo + width * gi as f64;
                    [(x0, 0.0), (x0 + width, count)]
                }
            });
        }
        out.push(rects);
    }
    out
}

/// Label for a category axis tick; blank between integer positions.
fn category_label(labels: &[String], value: f64) -> String {
    let idx = value.round();
    if (value - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn draw_bars<DB>(area: &DrawingArea<DB, Shift>, bars: &CategoryCounts) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = bars.categories.len();
    let y_max = bars.max_bar().max(1) as f64 * 1.1;
    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..n as f64 - 0.5, 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&|v: &f64| category_label(&bars.categories, *v))
        .x_desc(bars.x_label.as_str())
        .y_desc("count")
        .draw()?;

    let slots: Vec<(f64, f64)> = (0..n).map(|i| (i as f64 - 0.4, i as f64 + 0.4)).collect();
    for (gi, rects) in bar_rects(&bars.counts, &slots, bars.bar_mode).into_iter().enumerate() {
        let color = series_color(gi);
        chart
            .draw_series(rects.into_iter().map(|r| Rectangle::new(r, color.filled())))?
            .label(bars.groups[gi].as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    if bars.color_label.is_some() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_histogram<DB>(area: &DrawingArea<DB, Shift>, hist: &BinnedCounts) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (Some(lo), Some(hi)) = (hist.edges.first(), hist.edges.last()) else {
        return Ok(());
    };
    let y_max = hist.max_bar().max(1) as f64 * 1.1;
    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(*lo..*hi, 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(hist.x_label.as_str())
        .y_desc("count")
        .draw()?;

    let slots: Vec<(f64, f64)> = hist.edges.windows(2).map(|w| (w[0], w[1])).collect();
    for (gi, rects) in bar_rects(&hist.counts, &slots, hist.bar_mode).into_iter().enumerate() {
        let color = series_color(gi);
        chart
            .draw_series(
                rects
                    .into_iter()
                    .map(|r| Rectangle::new(r, color.mix(0.85).filled())),
            )?
            .label(hist.groups[gi].as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    if hist.color_label.is_some() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Tick label for a distribution: the category, plus the color group when it differs.
fn distribution_label(category: &str, group: &str) -> String {
    if category == group {
        category.to_string()
    } else {
        format!("{category} / {group}")
    }
}

/// Value range padded by 5% on each side.
fn padded(range: (f64, f64)) -> std::ops::Range<f64> {
    let (lo, hi) = range;
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - pad)..(hi + pad)
}

/// Position of each group in first-seen order, for consistent colors.
fn group_slots<'a>(groups: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for group in groups {
        if !seen.contains(&group) {
            seen.push(group);
        }
    }
    seen
}

fn draw_boxes<DB>(area: &DrawingArea<DB, Shift>, chart_data: &BoxChart) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let Some(range) = chart_data.value_range() else {
        return Ok(());
    };
    let labels: Vec<String> = chart_data
        .boxes
        .iter()
        .map(|b| distribution_label(&b.category, &b.group))
        .collect();
    let groups = group_slots(chart_data.boxes.iter().map(|b| b.group.as_str()));
    let n = labels.len();

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5..n as f64 - 0.5, padded(range))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&|v: &f64| category_label(&labels, *v))
        .x_desc(chart_data.x_label.as_str())
        .y_desc(chart_data.y_label.as_str())
        .draw()?;

    for (i, b) in chart_data.boxes.iter().enumerate() {
        let x = i as f64;
        let s = &b.summary;
        let gi = groups.iter().position(|g| *g == b.group).unwrap_or(0);
        let color = series_color(gi);

        chart.draw_series([
            Rectangle::new([(x - 0.3, s.q1), (x + 0.3, s.q3)], color.mix(0.3).filled()),
            Rectangle::new([(x - 0.3, s.q1), (x + 0.3, s.q3)], color.stroke_width(2)),
        ])?;
        chart.draw_series([
            PathElement::new(vec![(x - 0.3, s.median), (x + 0.3, s.median)], color.stroke_width(3)),
            PathElement::new(vec![(x, s.q3), (x, s.whisker_high)], color.stroke_width(1)),
            PathElement::new(vec![(x, s.q1), (x, s.whisker_low)], color.stroke_width(1)),
            PathElement::new(
                vec![(x - 0.15, s.whisker_high), (x + 0.15, s.whisker_high)],
                color.stroke_width(1),
            ),
            PathElement::new(
                vec![(x - 0.15, s.whisker_low), (x + 0.15, s.whisker_low)],
                color.stroke_width(1),
            ),
        ])?;
        chart.draw_series(
            s.outliers
                .iter()
                .map(|v| Circle::new((x, *v), 3, color.stroke_width(1))),
        )?;
    }
    Ok(())
}

fn draw_violins<DB>(area: &DrawingArea<DB, Shift>, chart_data: &ViolinChart) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let Some(range) = chart_data.value_range() else {
        return Ok(());
    };
    let labels: Vec<String> = chart_data
        .violins
        .iter()
        .map(|v| distribution_label(&v.category, &v.group))
        .collect();
    let groups = group_slots(chart_data.violins.iter().map(|v| v.group.as_str()));
    let n = labels.len();

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5..n as f64 - 0.5, padded(range))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&|v: &f64| category_label(&labels, *v))
        .x_desc(chart_data.x_label.as_str())
        .y_desc(chart_data.y_label.as_str())
        .draw()?;

    for (i, v) in chart_data.violins.iter().enumerate() {
        let x = i as f64;
        let gi = groups.iter().position(|g| *g == v.group).unwrap_or(0);
        let color = series_color(gi);
        let peak = v.density.iter().map(|p| p.1).fold(0.0, f64::max);
        if peak <= 0.0 {
            continue;
        }
        let half = |d: f64| d / peak * 0.4;

        let mut outline: Vec<(f64, f64)> =
            v.density.iter().map(|(y, d)| (x + half(*d), *y)).collect();
        outline.extend(v.density.iter().rev().map(|(y, d)| (x - half(*d), *y)));
        chart.draw_series([Polygon::new(outline.clone(), color.mix(0.35).filled())])?;
        outline.push(outline[0]);
        chart.draw_series([PathElement::new(outline, color.stroke_width(1))])?;

        let s = &v.summary;
        chart.draw_series([
            PathElement::new(vec![(x, s.q1), (x, s.q3)], BLACK.stroke_width(4)),
            PathElement::new(vec![(x - 0.1, s.median), (x + 0.1, s.median)], WHITE.stroke_width(2)),
        ])?;
    }
    Ok(())
}

fn draw_cloud<DB>(area: &DrawingArea<DB, Shift>, cloud: &ScatterCloud, yaw: f64) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let Some([x, y, z]) = cloud.ranges else {
        return Ok(());
    };
    let (_, height) = area.dim_in_pixel();
    let mut chart = ChartBuilder::on(area)
        .margin(30)
        .build_cartesian_3d(padded(x), padded(y), padded(z))?;
    chart.with_projection(|mut pb| {
        pb.yaw = yaw;
        pb.pitch = 0.35;
        pb.scale = 0.8;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.1))
        .max_light_lines(4)
        .draw()?;

    let symbols = cloud.symbols.len().max(1);
    for (gi, series) in cloud.series.iter().enumerate() {
        let color = series_color(gi);
        for symbol in 0..symbols {
            let points = series
                .points
                .iter()
                .zip(&series.symbols)
                .filter(|(_, s)| **s == symbol)
                .map(|(p, _)| (p[0], p[1], p[2]));
            let drawn = match symbol % 3 {
                0 => chart.draw_series(points.map(|p| Circle::new(p, 3, color.filled())))?,
                1 => chart.draw_series(points.map(|p| TriangleMarker::new(p, 4, color.filled())))?,
                _ => chart.draw_series(points.map(|p| Cross::new(p, 3, color.stroke_width(1))))?,
            };
            if symbol == 0 {
                drawn
                    .label(series.group.as_str())
                    .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    let [xl, yl, zl] = &cloud.labels;
    area.draw(&Text::new(
        format!("x: {xl}   y: {yl}   z: {zl}"),
        (10, height as i32 - 24),
        ("sans-serif", 14).into_font(),
    ))?;
    Ok(())
}

/// Per-chart line of `manifest.json`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManifestEntry {
    pub position: usize,
    pub id: String,
    pub title: String,
    pub tab: String,
    pub kind: String,
    /// "ok", "empty" or "failed".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportManifest {
    pub generated_at: String,
    pub format: String,
    pub generation: u64,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub selection: BTreeMap<String, Vec<String>>,
    pub charts: Vec<ManifestEntry>,
}

impl ExportManifest {
    pub fn failed(&self) -> usize {
        self.charts.iter().filter(|c| c.status == "failed").count()
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DashboardError::export(dir, e))
}

/// Export the chart at catalog `position` from the session's last render pass.
pub fn export_chart(
    session: &Session,
    position: usize,
    dir: &Path,
    options: &ExportOptions,
) -> Result<PathBuf> {
    let spec = session.catalog().charts.get(position).ok_or_else(|| {
        DashboardError::export(dir, format!("no chart at position {position}"))
    })?;
    let outcome = session
        .outcome(position)
        .ok_or_else(|| DashboardError::export(dir, "nothing has been rendered yet"))?;
    let chart = outcome.result.as_ref().map_err(Clone::clone)?;

    create_dir(dir)?;
    let path = dir.join(chart_file_name(position, &spec.id, options.format));
    write_chart(&path, spec, chart, options)?;
    info!(chart = %spec.id, path = %path.display(), "chart exported");
    Ok(path)
}

/// Export every chart of the last render pass into `dir` and write
/// `manifest.json`. A chart that failed to render or draw is recorded as
/// failed; the others are still written.
pub fn export_dashboard(
    session: &Session,
    dir: &Path,
    options: &ExportOptions,
) -> Result<ExportManifest> {
    let pass = session
        .last_pass()
        .ok_or_else(|| DashboardError::export(dir, "nothing has been rendered yet"))?;
    create_dir(dir)?;

    let mut charts = Vec::with_capacity(pass.outcomes.len());
    for (spec, outcome) in session.catalog().charts.iter().zip(&pass.outcomes) {
        let mut entry = ManifestEntry {
            position: outcome.position,
            id: spec.id.clone(),
            title: spec.title.clone(),
            tab: spec.tab.title().to_string(),
            kind: spec.kind.name().to_string(),
            status: "ok".to_string(),
            file: None,
            error: None,
        };
        let written = outcome.result.as_ref().map_err(Clone::clone).and_then(|chart| {
            let name = chart_file_name(outcome.position, &spec.id, options.format);
            write_chart(&dir.join(&name), spec, chart, options)?;
            Ok((name, chart.is_empty()))
        });
        match written {
            Ok((name, empty)) => {
                if empty {
                    entry.status = "empty".to_string();
                }
                entry.file = Some(name);
            }
            Err(err) => {
                warn!(chart = %spec.id, error = %err, "chart not exported");
                entry.status = "failed".to_string();
                entry.error = Some(err.to_string());
            }
        }
        charts.push(entry);
    }

    let manifest = ExportManifest {
        generated_at: chrono::Local::now().to_rfc3339(),
        format: options.format.extension().to_string(),
        generation: pass.generation,
        total_rows: session.table().height(),
        filtered_rows: pass.rows,
        selection: session
            .selection()
            .iter()
            .map(|(column, values)| {
                (
                    column.to_string(),
                    values.iter().map(ToString::to_string).collect(),
                )
            })
            .collect(),
        charts,
    };

    let path = dir.join(MANIFEST_FILE);
    let json =
        serde_json::to_string_pretty(&manifest).map_err(|e| DashboardError::export(&path, e))?;
    fs::write(&path, json).map_err(|e| DashboardError::export(&path, e))?;
    info!(
        dir = %dir.display(),
        charts = manifest.charts.len(),
        failed = manifest.failed(),
        "dashboard exported"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_numbered_from_one() {
        assert_eq!(
            chart_file_name(0, "attrition-count", ExportFormat::Png),
            "01-attrition-count.png"
        );
        assert_eq!(chart_file_name(11, "x", ExportFormat::Svg), "12-x.svg");
    }

    #[test]
    fn stacked_bars_sit_on_each_other() {
        let counts = vec![vec![2, 1], vec![3, 0]];
        let slots = [(-0.4, 0.4), (0.6, 1.4)];
        let rects = bar_rects(&counts, &slots, BarMode::Stacked);
        assert_eq!(rects[0][0], [(-0.4, 0.0), (0.4, 2.0)]);
        assert_eq!(rects[1][0], [(-0.4, 2.0), (0.4, 5.0)]);
        assert_eq!(rects[1][1], [(0.6, 1.0), (1.4, 1.0)]);
    }

    #[test]
    fn grouped_bars_split_the_slot() {
        let counts = vec![vec![2], vec![3]];
        let rects = bar_rects(&counts, &[(0.0, 1.0)], BarMode::Grouped);
        assert_eq!(rects[0][0], [(0.0, 0.0), (0.5, 2.0)]);
        assert_eq!(rects[1][0], [(0.5, 0.0), (1.0, 3.0)]);
    }

    #[test]
    fn category_ticks_only_at_integers() {
        let labels = vec!["No".to_string(), "Yes".to_string()];
        assert_eq!(category_label(&labels, 0.0), "No");
        assert_eq!(category_label(&labels, 1.0), "Yes");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, -1.0), "");
        assert_eq!(category_label(&labels, 2.0), "");
    }

    #[test]
    fn distribution_labels_collapse_matching_groups() {
        assert_eq!(distribution_label("Yes", "Yes"), "Yes");
        assert_eq!(distribution_label("Sales", "Yes"), "Sales / Yes");
    }
}
