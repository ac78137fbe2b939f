//! Prepare chart data from the filtered frame: scatter series with error bars,
//! histogram bins with a marginal summary, and density grids with contours.

use crate::options::{
    ColorScale, ContourStyle, DensityOptions, HistogramOptions, Marginal, Normalization,
    ScatterMode, ScatterOptions,
};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;

/// Number of contour levels drawn on a density plot.
const CONTOUR_LEVELS: usize = 8;
/// Points on which a violin outline is evaluated.
const VIOLIN_POINTS: usize = 50;
/// Upper bound on rug ticks drawn per column.
const RUG_LIMIT: usize = 500;

/// Values of a numeric column as f64, nulls kept as `None`.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| eyre!("column '{}' not found", name))?;
    let dtype = column.dtype();
    if !(dtype.is_numeric() || matches!(dtype, DataType::Boolean)) {
        return Err(eyre!("column '{}' is not numeric ({})", name, dtype));
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

fn finite_values(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

/// Padded `(min, max)` of `values`; a zero-width range is widened to width 1.
fn value_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    if hi > lo {
        Some((lo, hi))
    } else {
        Some((lo - 0.5, hi + 0.5))
    }
}

// ---------------------------------------------------------------------------
// Scatter

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    /// Half-widths of horizontal error bars, one per point.
    pub err_x: Option<Vec<f64>>,
    /// Half-heights of vertical error bars, one per point.
    pub err_y: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterData {
    pub x_label: String,
    pub mode: ScatterMode,
    pub series: Vec<ScatterSeries>,
    pub warnings: Vec<String>,
}

impl ScatterData {
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    /// `(x_min, x_max, y_min, y_max)` including error bars.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for s in &self.series {
            for (i, &(x, y)) in s.points.iter().enumerate() {
                let ex = s.err_x.as_ref().map_or(0.0, |e| e[i].abs());
                let ey = s.err_y.as_ref().map_or(0.0, |e| e[i].abs());
                xs.extend([x - ex, x + ex]);
                ys.extend([y - ey, y + ey]);
            }
        }
        let (x0, x1) = value_range(xs)?;
        let (y0, y1) = value_range(ys)?;
        Some((x0, x1, y0, y1))
    }
}

/// Rows where x or y is missing or not finite are skipped; a missing error
/// value draws no bar for that point.
pub fn prepare_scatter(
    df: &DataFrame,
    options: &ScatterOptions,
    row_limit: usize,
) -> Result<ScatterData> {
    let mut data = ScatterData {
        x_label: options.x.clone().unwrap_or_default(),
        mode: options.mode,
        series: Vec::new(),
        warnings: Vec::new(),
    };
    let Some(x_name) = options.x.as_deref() else {
        return Ok(data);
    };
    if options.y.is_empty() {
        return Ok(data);
    }

    let (pairs, warning) = options.error_bar_pairs();
    data.warnings.extend(warning);

    let rows = df.height().min(row_limit);
    if df.height() > row_limit {
        data.warnings.push(format!(
            "only the first {} of {} rows are plotted",
            row_limit,
            df.height()
        ));
    }

    let xs = numeric_column(df, x_name)?;
    for pair in pairs {
        let ys = numeric_column(df, &pair.y)?;
        let ex = pair.err_x.as_deref().map(|c| numeric_column(df, c)).transpose()?;
        let ey = pair.err_y.as_deref().map(|c| numeric_column(df, c)).transpose()?;

        let mut series = ScatterSeries {
            name: pair.y.clone(),
            points: Vec::with_capacity(rows),
            err_x: ex.as_ref().map(|_| Vec::with_capacity(rows)),
            err_y: ey.as_ref().map(|_| Vec::with_capacity(rows)),
        };
        for i in 0..rows {
            let (Some(x), Some(y)) = (xs[i], ys[i]) else {
                continue;
            };
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            series.points.push((x, y));
            let bar = |errs: &Option<Vec<Option<f64>>>| {
                errs.as_ref()
                    .and_then(|e| e[i])
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0)
            };
            if let Some(out) = series.err_x.as_mut() {
                out.push(bar(&ex));
            }
            if let Some(out) = series.err_y.as_mut() {
                out.push(bar(&ey));
            }
        }
        data.series.push(series);
    }
    Ok(data)
}

// ---------------------------------------------------------------------------
// Histogram

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    pub value: f64,
}

/// Five-number summary plus Tukey fences, for box marginals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    /// Lowest value within 1.5 IQR of q1.
    pub lower_whisker: f64,
    /// Highest value within 1.5 IQR of q3.
    pub upper_whisker: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSeries {
    pub name: String,
    pub bins: Vec<Bin>,
    pub summary: Option<Summary>,
    /// Raw values for a rug marginal (capped).
    pub rug: Vec<f64>,
    /// `(value, density)` outline for a violin marginal.
    pub violin: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramData {
    pub series: Vec<HistogramSeries>,
    pub normalization: Normalization,
    pub marginal: Marginal,
    pub range: Option<(f64, f64)>,
}

impl HistogramData {
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.bins.is_empty())
    }

    pub fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.bins.iter().map(|b| b.value))
            .fold(0.0, f64::max)
    }
}

/// Linear-interpolated quantile of sorted data.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;
    let lower_whisker = sorted
        .iter()
        .copied()
        .find(|v| *v >= lower_fence)
        .unwrap_or(q1);
    let upper_whisker = sorted
        .iter()
        .rev()
        .copied()
        .find(|v| *v <= upper_fence)
        .unwrap_or(q3);
    Some(Summary {
        count: sorted.len(),
        min: sorted[0],
        q1,
        median: quantile(&sorted, 0.5),
        q3,
        max: sorted[sorted.len() - 1],
        lower_whisker,
        upper_whisker,
    })
}

/// Gaussian kernel density estimate with Silverman's bandwidth.
fn kde(values: &[f64], range: (f64, f64), points: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    if n < 2 || points < 2 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = var.sqrt();
    let bandwidth = if sd > 0.0 {
        1.06 * sd * (n as f64).powf(-0.2)
    } else {
        (range.1 - range.0) / 20.0
    };
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    (0..points)
        .map(|i| {
            let x = range.0 + (range.1 - range.0) * i as f64 / (points - 1) as f64;
            let density = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

/// Bin `values` into `bins` equal-width bins over `range`.
pub fn bin_values(
    values: &[f64],
    range: (f64, f64),
    bins: usize,
    normalization: Normalization,
) -> Vec<Bin> {
    if bins == 0 {
        return Vec::new();
    }
    let (lo, hi) = range;
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let total = values.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| Bin {
            lo: lo + width * i as f64,
            hi: lo + width * (i + 1) as f64,
            value: normalization.apply(c as f64, total, width),
        })
        .collect()
}

/// Overlaid histograms share one set of bin edges.
pub fn prepare_histogram(df: &DataFrame, options: &HistogramOptions) -> Result<HistogramData> {
    let mut columns = Vec::with_capacity(options.columns.len());
    for name in &options.columns {
        columns.push((name.clone(), finite_values(&numeric_column(df, name)?)));
    }
    let range = value_range(columns.iter().flat_map(|(_, v)| v.iter().copied()));
    let bins = options.bins.get() as usize;

    let series = columns
        .into_iter()
        .map(|(name, values)| {
            let bins = range
                .map(|r| bin_values(&values, r, bins, options.normalization))
                .unwrap_or_default();
            let rug = if options.marginal == Marginal::Rug {
                let step = values.len().div_ceil(RUG_LIMIT).max(1);
                values.iter().step_by(step).copied().collect()
            } else {
                Vec::new()
            };
            let violin = match (options.marginal, range) {
                (Marginal::Violin, Some(r)) => kde(&values, r, VIOLIN_POINTS),
                _ => Vec::new(),
            };
            HistogramSeries {
                name,
                bins,
                summary: summarize(&values),
                rug,
                violin,
            }
        })
        .collect();

    Ok(HistogramData {
        series,
        normalization: options.normalization,
        marginal: options.marginal,
        range,
    })
}

// ---------------------------------------------------------------------------
// Density contour

#[derive(Debug, Clone, PartialEq)]
pub struct ContourLine {
    pub level: f64,
    pub segments: Vec<((f64, f64), (f64, f64))>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityData {
    pub x_label: String,
    pub y_label: String,
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    /// Sample counts indexed `[y][x]`.
    pub counts: Vec<Vec<f64>>,
    pub max_count: f64,
    pub levels: Vec<f64>,
    pub contours: Vec<ContourLine>,
    pub style: ContourStyle,
    pub scale: ColorScale,
    pub reversed: bool,
}

impl DensityData {
    pub fn is_empty(&self) -> bool {
        self.max_count <= 0.0
    }

    /// Centre of grid cell `i` along an edge vector.
    pub fn center(edges: &[f64], i: usize) -> f64 {
        (edges[i] + edges[i + 1]) / 2.0
    }

    /// Index of the highest level not above `value`, or `None` below the first level.
    pub fn band(&self, value: f64) -> Option<usize> {
        self.levels.iter().rposition(|l| value >= *l)
    }
}

fn edges(range: (f64, f64), n: usize) -> Vec<f64> {
    (0..=n)
        .map(|i| range.0 + (range.1 - range.0) * i as f64 / n as f64)
        .collect()
}

/// Marching squares over cell centres. Saddles emit both segment pairs.
fn contour_segments(
    grid: &[Vec<f64>],
    xs: &[f64],
    ys: &[f64],
    level: f64,
) -> Vec<((f64, f64), (f64, f64))> {
    let mut out = Vec::new();
    let lerp = |a: f64, b: f64, va: f64, vb: f64| {
        if (vb - va).abs() < f64::EPSILON {
            (a + b) / 2.0
        } else {
            a + (b - a) * (level - va) / (vb - va)
        }
    };
    for j in 0..ys.len().saturating_sub(1) {
        for i in 0..xs.len().saturating_sub(1) {
            let (a, b) = (grid[j][i], grid[j][i + 1]);
            let (d, c) = (grid[j + 1][i], grid[j + 1][i + 1]);
            let case = (a >= level) as u8
                | ((b >= level) as u8) << 1
                | ((c >= level) as u8) << 2
                | ((d >= level) as u8) << 3;
            let bottom = (lerp(xs[i], xs[i + 1], a, b), ys[j]);
            let right = (xs[i + 1], lerp(ys[j], ys[j + 1], b, c));
            let top = (lerp(xs[i], xs[i + 1], d, c), ys[j + 1]);
            let left = (xs[i], lerp(ys[j], ys[j + 1], a, d));
            match case {
                1 | 14 => out.push((left, bottom)),
                2 | 13 => out.push((bottom, right)),
                3 | 12 => out.push((left, right)),
                4 | 11 => out.push((right, top)),
                6 | 9 => out.push((bottom, top)),
                7 | 8 => out.push((left, top)),
                5 => {
                    out.push((left, top));
                    out.push((bottom, right));
                }
                10 => {
                    out.push((left, bottom));
                    out.push((right, top));
                }
                _ => {}
            }
        }
    }
    out
}

/// 2D histogram of `(x, y)` on a `grid`×`grid` lattice with contour levels.
pub fn prepare_density(
    df: &DataFrame,
    options: &DensityOptions,
    grid: usize,
) -> Result<Option<DensityData>> {
    let (Some(x_name), Some(y_name)) = (options.x.as_deref(), options.y.as_deref()) else {
        return Ok(None);
    };
    let grid = grid.max(2);
    let xs = numeric_column(df, x_name)?;
    let ys = numeric_column(df, y_name)?;
    let points: Vec<(f64, f64)> = xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .collect();

    let x_range = value_range(points.iter().map(|p| p.0)).unwrap_or((0.0, 1.0));
    let y_range = value_range(points.iter().map(|p| p.1)).unwrap_or((0.0, 1.0));
    let x_edges = edges(x_range, grid);
    let y_edges = edges(y_range, grid);

    let mut counts = vec![vec![0.0; grid]; grid];
    let cell = |v: f64, (lo, hi): (f64, f64)| {
        (((v - lo) / (hi - lo) * grid as f64).floor() as usize).min(grid - 1)
    };
    for &(x, y) in &points {
        counts[cell(y, y_range)][cell(x, x_range)] += 1.0;
    }
    let max_count = counts.iter().flatten().copied().fold(0.0, f64::max);
    let levels: Vec<f64> = if max_count > 0.0 {
        (1..=CONTOUR_LEVELS)
            .map(|k| max_count * k as f64 / (CONTOUR_LEVELS + 1) as f64)
            .collect()
    } else {
        Vec::new()
    };

    let centers_x: Vec<f64> = (0..grid).map(|i| DensityData::center(&x_edges, i)).collect();
    let centers_y: Vec<f64> = (0..grid).map(|j| DensityData::center(&y_edges, j)).collect();
    let contours = levels
        .iter()
        .map(|&level| ContourLine {
            level,
            segments: contour_segments(&counts, &centers_x, &centers_y, level),
        })
        .collect();

    Ok(Some(DensityData {
        x_label: x_name.to_string(),
        y_label: y_name.to_string(),
        x_edges,
        y_edges,
        counts,
        max_count,
        levels,
        contours,
        style: options.style,
        scale: options.scale,
        reversed: options.reversed(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BinCount;

    fn frame() -> DataFrame {
        df!(
            "S" => &[0.0_f64, 1.0, 2.0, 3.0],
            "BETX" => &[10.0_f64, f64::NAN, 30.0, 40.0],
            "ERR" => &[1.0_f64, 1.0, 2.0, 2.0],
            "NAME" => &["a", "b", "c", "d"],
        )
        .unwrap()
    }

    #[test]
    fn scatter_without_columns_is_empty() {
        let data = prepare_scatter(&frame(), &ScatterOptions::default(), 100).unwrap();
        assert!(data.is_empty());
        assert!(data.warnings.is_empty());
    }

    #[test]
    fn scatter_skips_nan_and_attaches_errors() {
        let opts = ScatterOptions {
            x: Some("S".into()),
            y: vec!["BETX".into()],
            err_y: vec!["ERR".into()],
            ..Default::default()
        };
        let data = prepare_scatter(&frame(), &opts, 100).unwrap();
        let s = &data.series[0];
        assert_eq!(s.points, vec![(0.0, 10.0), (2.0, 30.0), (3.0, 40.0)]);
        assert_eq!(s.err_y.as_deref(), Some(&[1.0, 2.0, 2.0][..]));
        assert!(s.err_x.is_none());
        assert_eq!(data.bounds(), Some((0.0, 3.0, 9.0, 42.0)));
    }

    #[test]
    fn scatter_rejects_text_columns() {
        let opts = ScatterOptions {
            x: Some("S".into()),
            y: vec!["NAME".into()],
            ..Default::default()
        };
        assert!(prepare_scatter(&frame(), &opts, 100).is_err());
    }

    #[test]
    fn scatter_row_limit_warns() {
        let opts = ScatterOptions {
            x: Some("S".into()),
            y: vec!["S".into()],
            ..Default::default()
        };
        let data = prepare_scatter(&frame(), &opts, 2).unwrap();
        assert_eq!(data.series[0].points.len(), 2);
        assert_eq!(data.warnings.len(), 1);
    }

    fn histogram(norm: Normalization) -> HistogramData {
        let df = df!("V" => (0..100).map(|i| (i % 10) as f64).collect::<Vec<_>>()).unwrap();
        let opts = HistogramOptions {
            columns: vec!["V".into()],
            normalization: norm,
            bins: BinCount::new(10).unwrap(),
            ..Default::default()
        };
        prepare_histogram(&df, &opts).unwrap()
    }

    #[test]
    fn histogram_counts_every_value() {
        let h = histogram(Normalization::None);
        let total: f64 = h.series[0].bins.iter().map(|b| b.value).sum();
        assert_eq!(total, 100.0);
        assert_eq!(h.series[0].bins.len(), 10);
    }

    #[test]
    fn histogram_normalizations() {
        let sum = |h: &HistogramData| h.series[0].bins.iter().map(|b| b.value).sum::<f64>();
        let area = |h: &HistogramData| {
            h.series[0]
                .bins
                .iter()
                .map(|b| b.value * (b.hi - b.lo))
                .sum::<f64>()
        };
        assert!((sum(&histogram(Normalization::Percent)) - 100.0).abs() < 1e-9);
        assert!((sum(&histogram(Normalization::Probability)) - 1.0).abs() < 1e-9);
        assert!((area(&histogram(Normalization::Density)) - 100.0).abs() < 1e-9);
        assert!((area(&histogram(Normalization::ProbabilityDensity)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_marginals() {
        let df = df!("V" => &[1.0_f64, 2.0, 3.0, 4.0, 100.0]).unwrap();
        let mut opts = HistogramOptions {
            columns: vec!["V".into()],
            marginal: Marginal::Violin,
            ..Default::default()
        };
        let h = prepare_histogram(&df, &opts).unwrap();
        assert_eq!(h.series[0].violin.len(), VIOLIN_POINTS);
        let summary = h.series[0].summary.unwrap();
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.upper_whisker, 4.0);
        opts.marginal = Marginal::Rug;
        let h = prepare_histogram(&df, &opts).unwrap();
        assert_eq!(h.series[0].rug.len(), 5);
    }

    #[test]
    fn constant_column_still_bins() {
        let df = df!("V" => &[2.0_f64, 2.0, 2.0]).unwrap();
        let opts = HistogramOptions {
            columns: vec!["V".into()],
            ..Default::default()
        };
        let h = prepare_histogram(&df, &opts).unwrap();
        assert_eq!(h.range, Some((1.5, 2.5)));
        let total: f64 = h.series[0].bins.iter().map(|b| b.value).sum();
        assert_eq!(total, 3.0);
    }

    #[test]
    fn density_grid_and_contours() {
        let xs: Vec<f64> = (0..200).map(|i| ((i * 7) % 20) as f64 / 4.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x * 0.5 + 1.0).collect();
        let df = df!("X" => xs, "Y" => ys).unwrap();
        let opts = DensityOptions {
            x: Some("X".into()),
            y: Some("Y".into()),
            ..Default::default()
        };
        let d = prepare_density(&df, &opts, 10).unwrap().unwrap();
        let total: f64 = d.counts.iter().flatten().sum();
        assert_eq!(total, 200.0);
        assert_eq!(d.levels.len(), CONTOUR_LEVELS);
        assert!(d.contours.iter().any(|c| !c.segments.is_empty()));
        assert_eq!(d.band(0.0), None);
        assert_eq!(d.band(d.max_count), Some(CONTOUR_LEVELS - 1));
    }

    #[test]
    fn density_needs_both_axes() {
        let opts = DensityOptions {
            x: Some("S".into()),
            ..Default::default()
        };
        assert!(prepare_density(&frame(), &opts, 10).unwrap().is_none());
    }

    #[test]
    fn quantiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.5), 2.5);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
    }
}
