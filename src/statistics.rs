//! Summary statistics behind box, violin and binned charts.

use polars::prelude::*;

pub(crate) fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// One value per row, `None` for nulls and non-finite floats.
pub(crate) fn numeric_cells(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    let as_float = column.cast(&DataType::Float64)?;
    Ok(as_float
        .f64()?
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Linear-interpolated quantile of an ascending slice (`q` in 0..=1).
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Tukey box summary: quartiles, 1.5 IQR fences, whiskers at the most
/// extreme values inside the fences, and the outliers beyond them.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25)?;
        let median = quantile(&sorted, 0.5)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let lower_fence = q1 - 1.5 * iqr;
        let upper_fence = q3 + 1.5 * iqr;

        let inside = sorted
            .iter()
            .copied()
            .filter(|v| *v >= lower_fence && *v <= upper_fence);
        let whisker_low = inside.clone().next().unwrap_or(q1);
        let whisker_high = inside.last().unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < lower_fence || *v > upper_fence)
            .collect();

        Some(Self {
            count: sorted.len(),
            min: sorted[0],
            q1,
            median,
            q3,
            max: sorted[sorted.len() - 1],
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            whisker_low,
            whisker_high,
            outliers,
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Silverman's rule of thumb; falls back to a unit bandwidth for degenerate input.
pub fn silverman_bandwidth(values: &[f64], summary: &BoxSummary) -> f64 {
    let std = sample_std(values);
    let spread = match (std > 0.0, summary.iqr() > 0.0) {
        (true, true) => std.min(summary.iqr() / 1.34),
        (true, false) => std,
        (false, true) => summary.iqr() / 1.34,
        (false, false) => return 1.0,
    };
    0.9 * spread * (values.len() as f64).powf(-0.2)
}

/// Gaussian kernel density sampled at `points` evenly spaced positions
/// spanning the data range padded by two bandwidths.
pub fn kernel_density(values: &[f64], summary: &BoxSummary, points: usize) -> Vec<(f64, f64)> {
    if values.is_empty() || points < 2 {
        return Vec::new();
    }
    let h = silverman_bandwidth(values, summary);
    let lo = summary.min - 2.0 * h;
    let hi = summary.max + 2.0 * h;
    let step = (hi - lo) / (points - 1) as f64;
    let norm = 1.0 / (values.len() as f64 * h * (2.0 * std::f64::consts::PI).sqrt());

    (0..points)
        .map(|i| {
            let x = lo + step * i as f64;
            let density = values
                .iter()
                .map(|v| {
                    let u = (x - v) / h;
                    (-0.5 * u * u).exp()
                })
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

/// `bins + 1` equal-width edges covering `[min, max]`. A single distinct
/// value gets a unit-wide range centred on it.
pub fn equal_width_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    if bins == 0 || !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let (lo, hi) = if max > min {
        (min, max)
    } else {
        (min - 0.5, min + 0.5)
    };
    let width = (hi - lo) / bins as f64;
    (0..=bins).map(|i| lo + width * i as f64).collect()
}

/// Bin index for `value`; the last bin is closed on the right.
pub fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let bins = edges.len().checked_sub(1)?;
    if bins == 0 || value < edges[0] || value > edges[bins] {
        return None;
    }
    let width = (edges[bins] - edges[0]) / bins as f64;
    let idx = ((value - edges[0]) / width).floor() as usize;
    Some(idx.min(bins - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn box_summary_flags_outliers() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        let summary = BoxSummary::from_values(&values).unwrap();
        assert_eq!(summary.count, 6);
        assert_eq!(summary.median, 3.5);
        assert_eq!(summary.outliers, vec![100.0]);
        assert_eq!(summary.whisker_high, 5.0);
        assert_eq!(summary.whisker_low, 1.0);
        assert_eq!(summary.max, 100.0);
    }

    #[test]
    fn box_summary_of_nothing_is_none() {
        assert!(BoxSummary::from_values(&[]).is_none());
        assert!(BoxSummary::from_values(&[f64::NAN]).is_none());
    }

    #[test]
    fn density_integrates_to_about_one() {
        let values: Vec<f64> = (0..200).map(|i| (i % 20) as f64).collect();
        let summary = BoxSummary::from_values(&values).unwrap();
        let curve = kernel_density(&values, &summary, 200);
        assert_eq!(curve.len(), 200);
        let step = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|(_, d)| d * step).sum();
        assert!((area - 1.0).abs() < 0.05, "area {area}");
    }

    #[test]
    fn constant_values_still_get_a_density() {
        let values = [5.0; 10];
        let summary = BoxSummary::from_values(&values).unwrap();
        assert_eq!(silverman_bandwidth(&values, &summary), 1.0);
        assert!(!kernel_density(&values, &summary, 16).is_empty());
    }

    #[test]
    fn bins_cover_the_range() {
        let edges = equal_width_edges(0.0, 10.0, 5);
        assert_eq!(edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(bin_index(&edges, 0.0), Some(0));
        assert_eq!(bin_index(&edges, 3.9), Some(1));
        assert_eq!(bin_index(&edges, 10.0), Some(4));
        assert_eq!(bin_index(&edges, 10.5), None);

        let single = equal_width_edges(3.0, 3.0, 2);
        assert_eq!(single, vec![2.5, 3.0, 3.5]);
        assert!(equal_width_edges(0.0, 1.0, 0).is_empty());
    }
}
