//! Chart area widget: draws one chart outcome in the terminal.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        canvas::{self, Canvas, Points, Rectangle},
        Bar, BarChart, BarGroup, Block, Borders, Paragraph, Widget, Wrap,
    },
};

use crate::chart_data::{BinnedCounts, BoxChart, CategoryCounts, Chart, ScatterCloud, ViolinChart};
use crate::chart_spec::{BarMode, ChartSpec};
use crate::config::Theme;
use crate::session::ChartOutcome;

/// Camera pitch for the terminal 3-D view, in radians.
pub const PITCH: f64 = 0.35;

/// One chart with its title bar, drawn from the last render pass.
pub struct ChartView<'a> {
    spec: &'a ChartSpec,
    outcome: Option<&'a ChartOutcome>,
    theme: &'a Theme,
    yaw: f64,
    /// (1-based index in tab, charts in tab)
    counter: (usize, usize),
}

impl<'a> ChartView<'a> {
    pub fn new(spec: &'a ChartSpec, outcome: Option<&'a ChartOutcome>, theme: &'a Theme) -> Self {
        Self {
            spec,
            outcome,
            theme,
            yaw: 0.5,
            counter: (1, 1),
        }
    }

    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn with_counter(mut self, index: usize, total: usize) -> Self {
        self.counter = (index, total);
        self
    }
}

impl Widget for ChartView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.get("chart_border")))
            .title(Line::from(vec![
                Span::styled(
                    format!(" {} ", self.spec.title),
                    Style::default()
                        .fg(self.theme.get("primary"))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("{}/{} ", self.counter.0, self.counter.1),
                    Style::default().fg(self.theme.get("dimmed")),
                ),
            ]));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Fill(1)])
            .split(inner);
        Paragraph::new(self.spec.description.as_str())
            .style(Style::default().fg(self.theme.get("text_secondary")))
            .render(layout[0], buf);
        let body = layout[1];

        let Some(outcome) = self.outcome else {
            Paragraph::new("Rendering...").render(body, buf);
            return;
        };
        let chart = match &outcome.result {
            Ok(chart) => chart,
            Err(err) => {
                Paragraph::new(vec![
                    Line::from(Span::styled(
                        "This chart could not be drawn",
                        Style::default()
                            .fg(self.theme.get("error"))
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::from(err.to_string()),
                ])
                .wrap(Wrap { trim: true })
                .render(body, buf);
                return;
            }
        };
        if chart.is_empty() {
            Paragraph::new("No rows match the current filters")
                .style(Style::default().fg(self.theme.get("dimmed")))
                .centered()
                .render(body, buf);
            return;
        }

        match chart {
            Chart::Bars(bars) => render_bars(bars, self.theme, body, buf),
            Chart::Histogram(hist) => render_histogram(hist, self.theme, body, buf),
            Chart::Box(boxes) => render_boxes(boxes, self.theme, body, buf),
            Chart::Violin(violins) => render_violins(violins, self.theme, body, buf),
            Chart::Scatter3d(cloud) => render_cloud(cloud, self.theme, self.yaw, body, buf),
        }
    }
}

/// Legend line naming each color group.
fn legend<'a>(title: Option<&str>, groups: &'a [String], theme: &Theme) -> Line<'a> {
    let mut spans = Vec::new();
    if let Some(title) = title {
        spans.push(Span::raw(format!("{title}: ")));
    }
    for (gi, group) in groups.iter().enumerate() {
        spans.push(Span::styled("■ ", Style::default().fg(theme.series_color(gi))));
        spans.push(Span::raw(group.as_str()));
        spans.push(Span::raw("  "));
    }
    Line::from(spans)
}

/// Width of each bar so `slots` groups of `per_slot` bars fit in `width`.
pub(crate) fn bar_width(width: u16, slots: usize, per_slot: usize) -> u16 {
    let bars = (slots * per_slot).max(1) as u16;
    let gaps = slots.saturating_sub(1) as u16;
    (width.saturating_sub(gaps) / bars).clamp(1, 9)
}

fn grouped_bars(
    labels: &[String],
    groups: &[String],
    counts: &[Vec<u64>],
    theme: &Theme,
    area: Rect,
    buf: &mut Buffer,
) {
    let width = bar_width(area.width, labels.len(), groups.len());
    let mut chart = BarChart::default()
        .bar_width(width)
        .bar_gap(0)
        .group_gap(1);
    for (ci, label) in labels.iter().enumerate() {
        let bars: Vec<Bar> = counts
            .iter()
            .enumerate()
            .map(|(gi, row)| {
                let color = theme.series_color(gi);
                Bar::default()
                    .value(row[ci])
                    .style(Style::default().fg(color))
                    .value_style(Style::default().fg(Color::Black).bg(color))
            })
            .collect();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(label.as_str()).centered())
                .bars(&bars),
        );
    }
    chart.render(area, buf);
}

/// Row heights of each group's segment in category `ci`, bottom first.
/// Rounded on cumulative totals so the stack height matches the total.
pub(crate) fn stack_heights(counts: &[Vec<u64>], ci: usize, max: u64, height: u16) -> Vec<u16> {
    let scale = |value: u64| ((value as f64 / max.max(1) as f64) * height as f64).round() as u16;
    let mut running = 0u64;
    let mut top = 0u16;
    counts
        .iter()
        .map(|row| {
            running += row.get(ci).copied().unwrap_or(0);
            let next = scale(running).min(height);
            let segment = next.saturating_sub(top);
            top = next;
            segment
        })
        .collect()
}

/// One bar per category with each group's count stacked on the previous one.
fn stacked_bars(
    labels: &[String],
    counts: &[Vec<u64>],
    theme: &Theme,
    area: Rect,
    buf: &mut Buffer,
) {
    if area.height < 3 || labels.is_empty() {
        return;
    }
    let totals: Vec<u64> = (0..labels.len())
        .map(|ci| counts.iter().filter_map(|row| row.get(ci)).sum())
        .collect();
    let max = totals.iter().copied().max().unwrap_or(0);
    let plot_height = area.height - 2;
    let label_row = area.bottom() - 1;
    let width = bar_width(area.width, labels.len(), 1);

    for (ci, label) in labels.iter().enumerate() {
        let x = area.x + ci as u16 * (width + 1);
        if x + width > area.right() {
            break;
        }
        let mut y = label_row;
        for (gi, segment) in stack_heights(counts, ci, max, plot_height)
            .into_iter()
            .enumerate()
        {
            let style = Style::default().fg(theme.series_color(gi));
            for _ in 0..segment {
                y -= 1;
                buf.set_stringn(x, y, "█".repeat(width as usize), width as usize, style);
            }
        }
        buf.set_stringn(x, y - 1, totals[ci].to_string(), width as usize, Style::default());
        buf.set_stringn(x, label_row, label, width as usize, Style::default());
    }
}

fn draw_counts(
    labels: &[String],
    groups: &[String],
    counts: &[Vec<u64>],
    bar_mode: BarMode,
    theme: &Theme,
    area: Rect,
    buf: &mut Buffer,
) {
    match bar_mode {
        BarMode::Stacked => stacked_bars(labels, counts, theme, area, buf),
        BarMode::Grouped => grouped_bars(labels, groups, counts, theme, area, buf),
    }
}

fn with_legend(area: Rect) -> (Rect, Rect) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Fill(1)])
        .split(area);
    (layout[0], layout[1])
}

fn render_bars(bars: &CategoryCounts, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let (legend_area, chart_area) = with_legend(area);
    legend(bars.color_label.as_deref(), &bars.groups, theme).render(legend_area, buf);
    draw_counts(
        &bars.categories,
        &bars.groups,
        &bars.counts,
        bars.bar_mode,
        theme,
        chart_area,
        buf,
    );
}

fn render_histogram(hist: &BinnedCounts, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let (legend_area, chart_area) = with_legend(area);
    let range = match (hist.edges.first(), hist.edges.last()) {
        (Some(lo), Some(hi)) => format!("{}: {lo:.1} to {hi:.1}   ", hist.x_label),
        _ => String::new(),
    };
    let mut line = legend(hist.color_label.as_deref(), &hist.groups, theme);
    line.spans.insert(0, Span::raw(range));
    line.render(legend_area, buf);

    let labels: Vec<String> = hist.edges.windows(2).map(|w| format!("{:.0}", w[0])).collect();
    draw_counts(
        &labels,
        &hist.groups,
        &hist.counts,
        hist.bar_mode,
        theme,
        chart_area,
        buf,
    );
}

fn distribution_label(category: &str, group: &str) -> String {
    if category == group {
        category.to_string()
    } else {
        format!("{category}/{group}")
    }
}

/// Canvas for box-like charts: one slot per distribution along x.
fn distribution_canvas<'a, F>(
    y_label: &'a str,
    labels: Vec<String>,
    range: (f64, f64),
    theme: &'a Theme,
    paint: F,
) -> Canvas<'a, impl Fn(&mut canvas::Context) + 'a>
where
    F: Fn(&mut canvas::Context) + 'a,
{
    let (lo, hi) = range;
    let pad = if hi > lo { (hi - lo) * 0.08 } else { 1.0 };
    let y_bounds = [lo - pad * 2.0, hi + pad];
    let n = labels.len();
    let axis_color = theme.get("dimmed");
    let text_color = theme.get("text_primary");

    Canvas::default()
        .marker(symbols::Marker::Braille)
        .x_bounds([-0.75, n as f64 - 0.25])
        .y_bounds(y_bounds)
        .paint(move |ctx| {
            ctx.draw(&canvas::Line {
                x1: -0.75,
                y1: lo,
                x2: -0.75,
                y2: hi,
                color: axis_color,
            });
            ctx.print(-0.75, hi, Span::styled(format!("{hi:.0}"), Style::default().fg(axis_color)));
            ctx.print(-0.75, lo, Span::styled(format!("{lo:.0}"), Style::default().fg(axis_color)));
            ctx.print(
                -0.75,
                y_bounds[1],
                Span::styled(y_label.to_string(), Style::default().fg(axis_color)),
            );
            ctx.layer();
            paint(ctx);
            for (i, label) in labels.iter().enumerate() {
                let x = i as f64 - (label.chars().count() as f64 * 0.01).min(0.3);
                ctx.print(
                    x,
                    y_bounds[0],
                    Span::styled(label.clone(), Style::default().fg(text_color)),
                );
            }
        })
}

fn render_boxes(chart: &BoxChart, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let Some(range) = chart.value_range() else {
        return;
    };
    let labels = chart
        .boxes
        .iter()
        .map(|b| distribution_label(&b.category, &b.group))
        .collect();
    let group_colors: Vec<Color> = chart
        .boxes
        .iter()
        .map(|b| group_color(chart.boxes.iter().map(|x| x.group.as_str()), &b.group, theme))
        .collect();

    distribution_canvas(&chart.y_label, labels, range, theme, move |ctx| {
        for (i, b) in chart.boxes.iter().enumerate() {
            let x = i as f64;
            let s = &b.summary;
            let color = group_colors[i];
            ctx.draw(&Rectangle {
                x: x - 0.3,
                y: s.q1,
                width: 0.6,
                height: (s.q3 - s.q1).max(f64::EPSILON),
                color,
            });
            for (x1, y1, x2, y2) in [
                (x - 0.3, s.median, x + 0.3, s.median),
                (x, s.q3, x, s.whisker_high),
                (x, s.q1, x, s.whisker_low),
                (x - 0.15, s.whisker_high, x + 0.15, s.whisker_high),
                (x - 0.15, s.whisker_low, x + 0.15, s.whisker_low),
            ] {
                ctx.draw(&canvas::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                });
            }
            let outliers: Vec<(f64, f64)> = s.outliers.iter().map(|v| (x, *v)).collect();
            ctx.draw(&Points {
                coords: &outliers,
                color,
            });
        }
    })
    .render(area, buf);
}

fn render_violins(chart: &ViolinChart, theme: &Theme, area: Rect, buf: &mut Buffer) {
    let Some(range) = chart.value_range() else {
        return;
    };
    let labels = chart
        .violins
        .iter()
        .map(|v| distribution_label(&v.category, &v.group))
        .collect();
    let group_colors: Vec<Color> = chart
        .violins
        .iter()
        .map(|v| group_color(chart.violins.iter().map(|x| x.group.as_str()), &v.group, theme))
        .collect();
    let median_color = theme.get("text_primary");

    distribution_canvas(&chart.y_label, labels, range, theme, move |ctx| {
        for (i, v) in chart.violins.iter().enumerate() {
            let x = i as f64;
            let color = group_colors[i];
            let peak = v.density.iter().map(|p| p.1).fold(0.0, f64::max);
            if peak <= 0.0 {
                continue;
            }
            for pair in v.density.windows(2) {
                let (y1, d1) = pair[0];
                let (y2, d2) = pair[1];
                let (w1, w2) = (d1 / peak * 0.4, d2 / peak * 0.4);
                for side in [-1.0, 1.0] {
                    ctx.draw(&canvas::Line {
                        x1: x + side * w1,
                        y1,
                        x2: x + side * w2,
                        y2,
                        color,
                    });
                }
            }
            let s = &v.summary;
            ctx.draw(&canvas::Line {
                x1: x,
                y1: s.q1,
                x2: x,
                y2: s.q3,
                color,
            });
            ctx.draw(&canvas::Line {
                x1: x - 0.1,
                y1: s.median,
                x2: x + 0.1,
                y2: s.median,
                color: median_color,
            });
        }
    })
    .render(area, buf);
}

fn group_color<'a>(groups: impl Iterator<Item = &'a str>, group: &str, theme: &Theme) -> Color {
    let mut seen: Vec<&str> = Vec::new();
    for g in groups {
        if !seen.contains(&g) {
            seen.push(g);
        }
    }
    theme.series_color(seen.iter().position(|g| *g == group).unwrap_or(0))
}

/// Rotate a point in the unit cube around the vertical axis, tilt it by
/// `pitch` and drop the depth coordinate.
pub fn project(point: [f64; 3], yaw: f64, pitch: f64) -> (f64, f64) {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let x = point[0] * cy - point[2] * sy;
    let depth = point[0] * sy + point[2] * cy;
    let y = point[1] * cp - depth * sp;
    (x, y)
}

/// Map `value` from `range` onto [-1, 1].
fn normalize(value: f64, range: (f64, f64)) -> f64 {
    let (lo, hi) = range;
    if hi > lo {
        (value - lo) / (hi - lo) * 2.0 - 1.0
    } else {
        0.0
    }
}

const CUBE_EDGES: [([f64; 3], [f64; 3]); 12] = [
    ([-1.0, -1.0, -1.0], [1.0, -1.0, -1.0]),
    ([-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]),
    ([-1.0, -1.0, 1.0], [1.0, -1.0, 1.0]),
    ([-1.0, 1.0, 1.0], [1.0, 1.0, 1.0]),
    ([-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0]),
    ([1.0, -1.0, -1.0], [1.0, 1.0, -1.0]),
    ([-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0]),
    ([1.0, -1.0, 1.0], [1.0, 1.0, 1.0]),
    ([-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0]),
    ([1.0, -1.0, -1.0], [1.0, -1.0, 1.0]),
    ([-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0]),
    ([1.0, 1.0, -1.0], [1.0, 1.0, 1.0]),
];

fn render_cloud(cloud: &ScatterCloud, theme: &Theme, yaw: f64, area: Rect, buf: &mut Buffer) {
    let Some(ranges) = cloud.ranges else {
        return;
    };
    let (legend_area, chart_area) = with_legend(area);
    let groups: Vec<String> = cloud.series.iter().map(|s| s.group.clone()).collect();
    let mut line = legend(None, &groups, theme);
    line.spans.push(Span::styled(
        format!(
            "x: {}  y: {}  z: {}  (h/l rotate)",
            cloud.labels[0], cloud.labels[1], cloud.labels[2]
        ),
        Style::default().fg(theme.get("dimmed")),
    ));
    line.render(legend_area, buf);

    let projected: Vec<Vec<(f64, f64)>> = cloud
        .series
        .iter()
        .map(|series| {
            series
                .points
                .iter()
                .map(|p| {
                    let unit = [
                        normalize(p[0], ranges[0]),
                        normalize(p[1], ranges[1]),
                        normalize(p[2], ranges[2]),
                    ];
                    project(unit, yaw, PITCH)
                })
                .collect()
        })
        .collect();
    let axis_color = theme.get("dimmed");
    let labels = cloud.labels.clone();

    Canvas::default()
        .marker(symbols::Marker::Braille)
        .x_bounds([-1.8, 1.8])
        .y_bounds([-1.8, 1.8])
        .paint(move |ctx| {
            for (a, b) in CUBE_EDGES {
                let (x1, y1) = project(a, yaw, PITCH);
                let (x2, y2) = project(b, yaw, PITCH);
                ctx.draw(&canvas::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: axis_color,
                });
            }
            for (axis, end) in [[1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, 1.0]]
                .into_iter()
                .enumerate()
            {
                let (x, y) = project(end, yaw, PITCH);
                ctx.print(
                    x,
                    y,
                    Span::styled(labels[axis].clone(), Style::default().fg(axis_color)),
                );
            }
            ctx.layer();
            for (gi, coords) in projected.iter().enumerate() {
                ctx.draw(&Points {
                    coords,
                    color: theme.series_color(gi),
                });
            }
        })
        .render(chart_area, buf);
}
