//! Chart renderer: map the filtered view's columns into a chart kind's encodings.

use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::chart_spec::{BarMode, ChartKind, ChartSpec};
use crate::error::{DashboardError, Result};
use crate::filter::{string_keys, FilterValue};
use crate::filter_engine::FilteredView;
use crate::statistics::{
    bin_index, equal_width_edges, is_numeric_type, kernel_density, numeric_cells, BoxSummary,
};

/// Sample count for each violin's density curve.
pub const DENSITY_POINTS: usize = 64;

/// Group label used when a chart has no color encoding.
pub const SINGLE_GROUP: &str = "count";

/// Counts per category, one row per color group.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCounts {
    pub x_label: String,
    pub color_label: Option<String>,
    pub categories: Vec<String>,
    pub groups: Vec<String>,
    /// `counts[group][category]`.
    pub counts: Vec<Vec<u64>>,
    pub bar_mode: BarMode,
}

impl CategoryCounts {
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Tallest bar: the per-category sum when stacked, the largest cell when grouped.
    pub fn max_bar(&self) -> u64 {
        tallest(&self.counts, self.categories.len(), self.bar_mode)
    }
}

/// Counts per equal-width bin over a numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedCounts {
    pub x_label: String,
    pub color_label: Option<String>,
    /// `bins + 1` ascending edges. Empty when no value survived filtering.
    pub edges: Vec<f64>,
    pub groups: Vec<String>,
    /// `counts[group][bin]`.
    pub counts: Vec<Vec<u64>>,
    pub bar_mode: BarMode,
}

impl BinnedCounts {
    pub fn bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn max_bar(&self) -> u64 {
        tallest(&self.counts, self.bins(), self.bar_mode)
    }
}

fn tallest(counts: &[Vec<u64>], width: usize, mode: BarMode) -> u64 {
    match mode {
        BarMode::Stacked => (0..width)
            .map(|i| counts.iter().map(|row| row[i]).sum::<u64>())
            .max()
            .unwrap_or(0),
        BarMode::Grouped => counts.iter().flatten().copied().max().unwrap_or(0),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxGroup {
    pub category: String,
    pub group: String,
    pub summary: BoxSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxChart {
    pub x_label: String,
    pub y_label: String,
    pub boxes: Vec<BoxGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolinGroup {
    pub category: String,
    pub group: String,
    pub summary: BoxSummary,
    /// `(value, density)` pairs in ascending value order.
    pub density: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolinChart {
    pub x_label: String,
    pub y_label: String,
    pub violins: Vec<ViolinGroup>,
}

impl BoxChart {
    pub fn value_range(&self) -> Option<(f64, f64)> {
        span(self.boxes.iter().map(|b| (b.summary.min, b.summary.max)))
    }
}

impl ViolinChart {
    pub fn value_range(&self) -> Option<(f64, f64)> {
        span(self.violins.iter().map(|v| {
            let lo = v.density.first().map_or(v.summary.min, |p| p.0);
            let hi = v.density.last().map_or(v.summary.max, |p| p.0);
            (lo, hi)
        }))
    }
}

fn span(ranges: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    ranges.fold(None, |acc, (lo, hi)| match acc {
        None => Some((lo, hi)),
        Some((a, b)) => Some((a.min(lo), b.max(hi))),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    pub group: String,
    pub points: Vec<[f64; 3]>,
    /// Index into `ScatterCloud::symbols` for each point.
    pub symbols: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterCloud {
    pub labels: [String; 3],
    pub symbol_label: Option<String>,
    pub symbols: Vec<String>,
    pub series: Vec<ScatterSeries>,
    /// `(min, max)` per axis; `None` when there are no points.
    pub ranges: Option<[(f64, f64); 3]>,
}

impl ScatterCloud {
    pub fn len(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renderable artifact for one chart specification.
#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Bars(CategoryCounts),
    Histogram(BinnedCounts),
    Box(BoxChart),
    Violin(ViolinChart),
    Scatter3d(ScatterCloud),
}

impl Chart {
    /// True when nothing would be drawn (all rows filtered out).
    pub fn is_empty(&self) -> bool {
        match self {
            Chart::Bars(bars) => bars.total() == 0,
            Chart::Histogram(hist) => hist.total() == 0,
            Chart::Box(chart) => chart.boxes.is_empty(),
            Chart::Violin(chart) => chart.violins.is_empty(),
            Chart::Scatter3d(cloud) => cloud.is_empty(),
        }
    }
}

/// Render one chart from the filtered view. Pure function of its inputs.
pub fn render(view: &FilteredView, spec: &ChartSpec) -> Result<Chart> {
    for column in spec.kind.columns() {
        if view.column(column).is_none() {
            return Err(DashboardError::spec_mismatch(
                &spec.id,
                format!("column '{column}' not in view"),
            ));
        }
    }

    let ctx = Encoder { view, spec };
    match &spec.kind {
        ChartKind::Histogram {
            x,
            color,
            bins: Some(bins),
            bar_mode,
        } => ctx.binned(x, color.as_deref(), *bins, *bar_mode).map(Chart::Histogram),
        ChartKind::Histogram {
            x,
            color,
            bins: None,
            bar_mode,
        } => ctx.bars(x, color.as_deref(), *bar_mode).map(Chart::Bars),
        ChartKind::Box { x, y, color } => {
            let boxes = ctx
                .distributions(x, y, color.as_deref())?
                .into_iter()
                .filter_map(|((category, group), values)| {
                    BoxSummary::from_values(&values).map(|summary| BoxGroup {
                        category: category.to_string(),
                        group: group.to_string(),
                        summary,
                    })
                })
                .collect();
            Ok(Chart::Box(BoxChart {
                x_label: x.clone(),
                y_label: y.clone(),
                boxes,
            }))
        }
        ChartKind::Violin { x, y, color } => {
            let violins = ctx
                .distributions(x, y, color.as_deref())?
                .into_iter()
                .filter_map(|((category, group), values)| {
                    let summary = BoxSummary::from_values(&values)?;
                    let density = kernel_density(&values, &summary, DENSITY_POINTS);
                    Some(ViolinGroup {
                        category: category.to_string(),
                        group: group.to_string(),
                        summary,
                        density,
                    })
                })
                .collect();
            Ok(Chart::Violin(ViolinChart {
                x_label: x.clone(),
                y_label: y.clone(),
                violins,
            }))
        }
        ChartKind::Scatter3d {
            x,
            y,
            z,
            color,
            symbol,
        } => ctx
            .cloud([x, y, z], color.as_deref(), symbol.as_deref())
            .map(Chart::Scatter3d),
    }
}

struct Encoder<'a> {
    view: &'a FilteredView,
    spec: &'a ChartSpec,
}

impl Encoder<'_> {
    fn column(&self, name: &str) -> Result<&Column> {
        self.view.column(name).ok_or_else(|| {
            DashboardError::spec_mismatch(&self.spec.id, format!("column '{name}' not in view"))
        })
    }

    fn mismatch(&self, err: PolarsError) -> DashboardError {
        DashboardError::spec_mismatch(&self.spec.id, err.to_string())
    }

    /// Display keys per row for a categorical encoding.
    fn keys(&self, name: &str) -> Result<Vec<Option<String>>> {
        let keys = string_keys(self.column(name)?).map_err(|e| self.mismatch(e))?;
        Ok(keys.iter().map(|v| v.map(str::to_string)).collect())
    }

    /// Group keys per row; a single shared group when there is no color encoding.
    fn groups(&self, color: Option<&str>) -> Result<Vec<Option<String>>> {
        match color {
            Some(name) => self.keys(name),
            None => Ok(vec![Some(SINGLE_GROUP.to_string()); self.view.height()]),
        }
    }

    /// Float values per row for a numeric encoding.
    fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.column(name)?;
        if column.dtype() == &DataType::Null {
            return Ok(vec![None; column.len()]);
        }
        if !is_numeric_type(column.dtype()) {
            return Err(DashboardError::spec_mismatch(
                &self.spec.id,
                format!("column '{name}' is {} but a numeric column is required", column.dtype()),
            ));
        }
        numeric_cells(column).map_err(|e| self.mismatch(e))
    }

    fn bars(&self, x: &str, color: Option<&str>, bar_mode: BarMode) -> Result<CategoryCounts> {
        let xs = self.keys(x)?;
        let gs = self.groups(color)?;

        let pairs: Vec<(FilterValue, FilterValue)> = xs
            .into_iter()
            .zip(gs)
            .filter_map(|(x, g)| Some((FilterValue::from(x?), FilterValue::from(g?))))
            .collect();
        let categories: Vec<FilterValue> = ordered(pairs.iter().map(|p| &p.0));
        let groups: Vec<FilterValue> = ordered(pairs.iter().map(|p| &p.1));

        let mut counts = vec![vec![0u64; categories.len()]; groups.len()];
        for (x, g) in &pairs {
            if let (Ok(ci), Ok(gi)) = (categories.binary_search(x), groups.binary_search(g)) {
                counts[gi][ci] += 1;
            }
        }

        Ok(CategoryCounts {
            x_label: x.to_string(),
            color_label: color.map(str::to_string),
            categories: labels(categories),
            groups: labels(groups),
            counts,
            bar_mode,
        })
    }

    fn binned(
        &self,
        x: &str,
        color: Option<&str>,
        bins: usize,
        bar_mode: BarMode,
    ) -> Result<BinnedCounts> {
        let xs = self.numbers(x)?;
        let gs = self.groups(color)?;

        let pairs: Vec<(f64, FilterValue)> = xs
            .into_iter()
            .zip(gs)
            .filter_map(|(x, g)| Some((x?, FilterValue::from(g?))))
            .collect();
        let groups: Vec<FilterValue> = ordered(pairs.iter().map(|p| &p.1));

        let edges = match span(pairs.iter().map(|p| (p.0, p.0))) {
            Some((lo, hi)) => equal_width_edges(lo, hi, bins),
            None => Vec::new(),
        };
        let mut counts = vec![vec![0u64; edges.len().saturating_sub(1)]; groups.len()];
        for (value, g) in &pairs {
            if let (Some(bi), Ok(gi)) = (bin_index(&edges, *value), groups.binary_search(g)) {
                counts[gi][bi] += 1;
            }
        }

        Ok(BinnedCounts {
            x_label: x.to_string(),
            color_label: color.map(str::to_string),
            edges,
            groups: labels(groups),
            counts,
            bar_mode,
        })
    }

    /// Numeric `y` values bucketed by (`x` category, color group).
    fn distributions(
        &self,
        x: &str,
        y: &str,
        color: Option<&str>,
    ) -> Result<BTreeMap<(FilterValue, FilterValue), Vec<f64>>> {
        let ys = self.numbers(y)?;
        let xs = self.keys(x)?;
        let gs = match color {
            Some(_) => self.groups(color)?,
            None => xs.clone(),
        };

        let mut buckets: BTreeMap<(FilterValue, FilterValue), Vec<f64>> = BTreeMap::new();
        for ((x, g), y) in xs.into_iter().zip(gs).zip(ys) {
            if let (Some(x), Some(g), Some(y)) = (x, g, y) {
                buckets
                    .entry((FilterValue::from(x), FilterValue::from(g)))
                    .or_default()
                    .push(y);
            }
        }
        Ok(buckets)
    }

    fn cloud(
        &self,
        axes: [&String; 3],
        color: Option<&str>,
        symbol: Option<&str>,
    ) -> Result<ScatterCloud> {
        let xs = self.numbers(axes[0])?;
        let ys = self.numbers(axes[1])?;
        let zs = self.numbers(axes[2])?;
        let gs = self.groups(color)?;
        let ss = match symbol {
            Some(name) => self.keys(name)?,
            None => vec![Some(String::new()); self.view.height()],
        };

        let rows: Vec<([f64; 3], FilterValue, FilterValue)> = xs
            .into_iter()
            .zip(ys)
            .zip(zs)
            .zip(gs)
            .zip(ss)
            .filter_map(|((((x, y), z), g), s)| {
                Some(([x?, y?, z?], FilterValue::from(g?), FilterValue::from(s?)))
            })
            .collect();

        let groups: Vec<FilterValue> = ordered(rows.iter().map(|r| &r.1));
        let symbols: Vec<FilterValue> = ordered(rows.iter().map(|r| &r.2));

        let mut series: Vec<ScatterSeries> = groups
            .iter()
            .map(|g| ScatterSeries {
                group: g.to_string(),
                points: Vec::new(),
                symbols: Vec::new(),
            })
            .collect();
        let mut ranges: Option<[(f64, f64); 3]> = None;
        for (point, g, s) in &rows {
            let (Ok(gi), Ok(si)) = (groups.binary_search(g), symbols.binary_search(s)) else {
                continue;
            };
            series[gi].points.push(*point);
            series[gi].symbols.push(si);
            let bounds = ranges.get_or_insert(point.map(|v| (v, v)));
            for (axis, value) in bounds.iter_mut().zip(point) {
                axis.0 = axis.0.min(*value);
                axis.1 = axis.1.max(*value);
            }
        }

        Ok(ScatterCloud {
            labels: axes.map(|a| a.clone()),
            symbol_label: symbol.map(str::to_string),
            symbols: if symbol.is_some() { labels(symbols) } else { Vec::new() },
            series,
            ranges,
        })
    }
}

fn ordered<'a>(values: impl Iterator<Item = &'a FilterValue>) -> Vec<FilterValue> {
    values.cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

fn labels(values: Vec<FilterValue>) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_spec::DashboardTab;
    use crate::dataset::Table;
    use crate::filter::FilterSelection;
    use crate::filter_engine::apply;

    fn spec(id: &str, kind: ChartKind) -> ChartSpec {
        ChartSpec {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            tab: DashboardTab::Overview,
            kind,
        }
    }

    fn view() -> FilteredView {
        let table: Table = df!(
            "Department" => &["Sales", "Sales", "R&D", "R&D", "HR"],
            "Attrition" => &["Yes", "No", "No", "No", "Yes"],
            "Age" => &[Some(30i64), Some(40), Some(35), None, Some(50)],
            "JobLevel" => &[2i64, 10, 1, 2, 1],
            "MonthlyIncome" => &[3000.0, 5000.0, 4000.0, 4500.0, 2000.0],
            "Years" => &[1i64, 5, 3, 8, 2]
        )
        .unwrap()
        .into();
        apply(&table, &FilterSelection::new()).unwrap()
    }

    fn histogram(x: &str, color: Option<&str>, bins: Option<usize>) -> ChartKind {
        ChartKind::Histogram {
            x: x.into(),
            color: color.map(Into::into),
            bins,
            bar_mode: BarMode::Grouped,
        }
    }

    #[test]
    fn counts_categories_by_group() {
        let spec = spec("dept", histogram("Department", Some("Attrition"), None));
        let chart = render(&view(), &spec).unwrap();
        let Chart::Bars(bars) = chart else {
            panic!("expected bars");
        };
        assert_eq!(bars.categories, vec!["HR", "R&D", "Sales"]);
        assert_eq!(bars.groups, vec!["No", "Yes"]);
        assert_eq!(bars.counts, vec![vec![0, 2, 1], vec![1, 0, 1]]);
        assert_eq!(bars.total(), 5);
        assert_eq!(bars.max_bar(), 2);
    }

    #[test]
    fn numeric_categories_sort_numerically() {
        let chart = render(&view(), &spec("level", histogram("JobLevel", None, None))).unwrap();
        let Chart::Bars(bars) = chart else {
            panic!("expected bars");
        };
        assert_eq!(bars.categories, vec!["1", "2", "10"]);
        assert_eq!(bars.groups, vec![SINGLE_GROUP]);
        assert_eq!(bars.counts, vec![vec![2, 2, 1]]);
    }

    #[test]
    fn binned_histogram_drops_null_rows() {
        let spec = spec("age", histogram("Age", Some("Attrition"), Some(2)));
        let chart = render(&view(), &spec).unwrap();
        let Chart::Histogram(hist) = chart else {
            panic!("expected histogram");
        };
        assert_eq!(hist.edges, vec![30.0, 40.0, 50.0]);
        assert_eq!(hist.total(), 4);
        assert_eq!(hist.counts, vec![vec![1, 1], vec![1, 1]]);
    }

    #[test]
    fn box_summaries_per_category() {
        let kind = ChartKind::Box {
            x: "Attrition".into(),
            y: "MonthlyIncome".into(),
            color: Some("Attrition".into()),
        };
        let Chart::Box(chart) = render(&view(), &spec("income", kind)).unwrap() else {
            panic!("expected box");
        };
        assert_eq!(chart.boxes.len(), 2);
        assert_eq!(chart.boxes[0].category, "No");
        assert_eq!(chart.boxes[0].summary.median, 4500.0);
        assert_eq!(chart.boxes[1].category, "Yes");
        assert_eq!(chart.boxes[1].summary.count, 2);
        assert_eq!(chart.value_range(), Some((2000.0, 5000.0)));
    }

    #[test]
    fn violins_carry_a_density() {
        let kind = ChartKind::Violin {
            x: "Department".into(),
            y: "Years".into(),
            color: None,
        };
        let Chart::Violin(chart) = render(&view(), &spec("years", kind)).unwrap() else {
            panic!("expected violin");
        };
        assert_eq!(chart.violins.len(), 3);
        assert!(chart
            .violins
            .iter()
            .all(|v| v.density.len() == DENSITY_POINTS));
    }

    #[test]
    fn scatter_groups_points_and_tracks_ranges() {
        let kind = ChartKind::Scatter3d {
            x: "Age".into(),
            y: "MonthlyIncome".into(),
            z: "Years".into(),
            color: Some("Attrition".into()),
            symbol: Some("Department".into()),
        };
        let Chart::Scatter3d(cloud) = render(&view(), &spec("cloud", kind)).unwrap() else {
            panic!("expected scatter");
        };
        assert_eq!(cloud.len(), 4);
        assert_eq!(cloud.symbols, vec!["HR", "R&D", "Sales"]);
        assert_eq!(cloud.series[0].group, "No");
        assert_eq!(cloud.series[0].points.len(), 2);
        let ranges = cloud.ranges.unwrap();
        assert_eq!(ranges[0], (30.0, 50.0));
        assert_eq!(ranges[2], (1.0, 5.0));
    }

    #[test]
    fn missing_column_is_a_spec_mismatch() {
        let err = render(&view(), &spec("bad", histogram("Salary", None, None))).unwrap_err();
        assert!(matches!(err, DashboardError::SpecMismatch { ref chart, .. } if chart == "bad"));
    }

    #[test]
    fn text_column_on_a_numeric_axis_is_a_spec_mismatch() {
        let kind = ChartKind::Box {
            x: "Attrition".into(),
            y: "Department".into(),
            color: None,
        };
        let err = render(&view(), &spec("text", kind)).unwrap_err();
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn empty_view_renders_empty_charts() {
        let table: Table = df!("Age" => &[30i64, 40], "Attrition" => &["Yes", "No"])
            .unwrap()
            .into();
        let view = apply(
            &table,
            &FilterSelection::new().with("Attrition", Vec::<FilterValue>::new()),
        )
        .unwrap();
        let chart = render(&view, &spec("age", histogram("Age", None, Some(10)))).unwrap();
        assert!(chart.is_empty());
        let Chart::Histogram(hist) = chart else {
            panic!("expected histogram");
        };
        assert!(hist.edges.is_empty());
    }
}
