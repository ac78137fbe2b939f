//! Exploratory profiling report for a table: overview, per-variable
//! summaries, correlations and alerts.

use chrono::Local;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// Datasets with more rows than this are sampled
pub const SAMPLING_THRESHOLD: usize = 10_000;

const MINI_HISTOGRAM_BINS: usize = 10;
const TOP_VALUES: usize = 10;

const MISSING_ALERT: f64 = 0.05;
const ZEROS_ALERT: f64 = 0.10;
const SKEWNESS_ALERT: f64 = 20.0;
const CORRELATION_ALERT: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Numeric,
    Text,
    Boolean,
    Other,
}

impl VariableKind {
    fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => VariableKind::Boolean,
            DataType::String => VariableKind::Text,
            d if d.is_numeric() => VariableKind::Numeric,
            _ => VariableKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
    pub missing_percent: f64,
    pub duplicate_rows: usize,
    pub numeric_columns: usize,
    pub text_columns: usize,
    pub boolean_columns: usize,
    /// Rows profiled when the table was sampled.
    pub sampled_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p5: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub p95: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub zeros: usize,
    pub negatives: usize,
    pub infinite: usize,
    pub outliers_iqr: usize,
    /// Counts in equal-width bins between min and max.
    pub histogram: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSummary {
    pub mode: Option<String>,
    pub top_values: Vec<(String, usize)>,
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableProfile {
    pub name: String,
    pub dtype: String,
    pub kind: VariableKind,
    pub is_index: bool,
    pub count: usize,
    pub missing: usize,
    pub missing_percent: f64,
    pub distinct: usize,
    pub distinct_percent: f64,
    pub numeric: Option<NumericSummary>,
    pub text: Option<TextSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Pearson coefficients; NaN where fewer than 3 shared values exist.
    pub correlations: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Missing,
    Zeros,
    Skewed,
    Infinite,
    HighCorrelation,
    Constant,
    Unique,
    Duplicates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub column: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileReport {
    pub generated_at: String,
    pub overview: Overview,
    pub variables: Vec<VariableProfile>,
    pub correlations: Option<CorrelationMatrix>,
    pub alerts: Vec<Alert>,
}

impl ProfileReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableProfile> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn alerts_of(&self, kind: AlertKind) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(move |a| a.kind == kind)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Every nth row, so the sample spans the whole table.
fn sample_rows(df: &DataFrame, sample_size: usize) -> Result<DataFrame> {
    let total_rows = df.height();
    if total_rows <= sample_size || sample_size == 0 {
        return Ok(df.clone());
    }
    let step = total_rows.div_ceil(sample_size);
    let indices = UInt32Chunked::new(
        "indices".into(),
        (0..total_rows)
            .step_by(step)
            .map(|i| i as u32)
            .collect::<Vec<_>>(),
    );
    df.take(&indices)
        .map_err(|e| color_eyre::eyre::eyre!("Sampling error: {}", e))
}

/// Values as f64 with nulls kept as `None`. NaN is reported as missing.
fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    crate::chart_data::quantile(sorted, q)
}

fn compute_skewness(values: &[f64], mean: f64, std: f64) -> f64 {
    let n = values.len() as f64;
    if std == 0.0 || n < 3.0 {
        return 0.0;
    }
    let sum_cubed: f64 = values.iter().map(|v| ((v - mean) / std).powi(3)).sum();
    (n / ((n - 1.0) * (n - 2.0))) * sum_cubed
}

fn compute_kurtosis(values: &[f64], mean: f64, std: f64) -> f64 {
    let n = values.len() as f64;
    if std == 0.0 || n < 4.0 {
        return 0.0;
    }
    let sum_fourth: f64 = values.iter().map(|v| ((v - mean) / std).powi(4)).sum();
    // Excess kurtosis, 0 for a normal distribution
    (n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0))) * sum_fourth
        - 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

fn numeric_summary(values: &[Option<f64>]) -> Option<NumericSummary> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let infinite = present.iter().filter(|v| v.is_infinite()).count();
    let mut finite: Vec<f64> = present.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let std = if finite.len() > 1 {
        (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let q25 = quantile(&finite, 0.25);
    let q75 = quantile(&finite, 0.75);
    let iqr = q75 - q25;
    let (lo_fence, hi_fence) = (q25 - 1.5 * iqr, q75 + 1.5 * iqr);
    let min = finite[0];
    let max = finite[finite.len() - 1];

    let mut histogram = vec![0usize; MINI_HISTOGRAM_BINS];
    let width = (max - min) / MINI_HISTOGRAM_BINS as f64;
    for v in &finite {
        let idx = if width > 0.0 {
            (((v - min) / width).floor() as usize).min(MINI_HISTOGRAM_BINS - 1)
        } else {
            MINI_HISTOGRAM_BINS / 2
        };
        histogram[idx] += 1;
    }

    Some(NumericSummary {
        mean,
        std,
        min,
        max,
        p5: quantile(&finite, 0.05),
        q25,
        median: quantile(&finite, 0.5),
        q75,
        p95: quantile(&finite, 0.95),
        skewness: compute_skewness(&finite, mean, std),
        kurtosis: compute_kurtosis(&finite, mean, std),
        zeros: finite.iter().filter(|v| **v == 0.0).count(),
        negatives: finite.iter().filter(|v| **v < 0.0).count(),
        infinite,
        outliers_iqr: finite
            .iter()
            .filter(|v| **v < lo_fence || **v > hi_fence)
            .count(),
        histogram,
    })
}

fn text_summary(values: &[Option<&str>]) -> TextSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v).or_default() += 1;
    }
    let mut top: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(v, c)| (v.to_string(), c))
        .collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(TOP_VALUES);

    let lengths: Vec<usize> = values.iter().flatten().map(|v| v.chars().count()).collect();
    TextSummary {
        mode: top.first().map(|(v, _)| v.clone()),
        top_values: top,
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        mean_length: if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
        },
    }
}

fn distinct_numeric(values: &[Option<f64>]) -> usize {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);
    present.dedup();
    present.len()
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect();
    if pairs.len() < 3 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean1 = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean2 = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let numerator: f64 = pairs.iter().map(|(x, y)| (x - mean1) * (y - mean2)).sum();
    let var1: f64 = pairs.iter().map(|(x, _)| (x - mean1).powi(2)).sum();
    let var2: f64 = pairs.iter().map(|(_, y)| (y - mean2).powi(2)).sum();
    if var1 == 0.0 || var2 == 0.0 {
        return f64::NAN;
    }
    numerator / (var1.sqrt() * var2.sqrt())
}

fn duplicate_rows(df: &DataFrame) -> Result<usize> {
    let columns = df.get_columns();
    let mut seen = HashSet::with_capacity(df.height());
    let mut duplicates = 0;
    for row in 0..df.height() {
        let mut key = String::new();
        for column in columns {
            key.push_str(&format!("{:?}\u{1f}", column.get(row)?));
        }
        if !seen.insert(key) {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

/// Profile `df`. Tables over `sampling_threshold` rows are sampled for the
/// per-variable statistics; counts in the overview use every row.
pub fn profile(
    df: &DataFrame,
    index: Option<&str>,
    sampling_threshold: usize,
) -> Result<ProfileReport> {
    let rows = df.height();
    let sampled = rows > sampling_threshold && sampling_threshold > 0;
    let data = if sampled {
        sample_rows(df, sampling_threshold)?
    } else {
        df.clone()
    };

    let mut variables = Vec::new();
    let mut numeric_columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    let mut alerts = Vec::new();
    let mut missing_cells = 0;

    for (name, dtype) in df.schema().iter() {
        let kind = VariableKind::of(dtype);
        let full = df.column(name)?;
        let column = data.column(name)?;
        let count = column.len();

        let (missing_full, distinct, numeric, text) = match kind {
            VariableKind::Numeric => {
                let full_values = numeric_values(full)?;
                let values = numeric_values(column)?;
                let missing = full_values.iter().filter(|v| v.is_none()).count();
                let summary = numeric_summary(&values);
                numeric_columns.push((name.to_string(), values.clone()));
                (missing, distinct_numeric(&values), summary, None)
            }
            VariableKind::Text => {
                let strings = column.as_materialized_series().str()?;
                let values: Vec<Option<&str>> = strings.into_iter().collect();
                let distinct = values.iter().flatten().collect::<HashSet<_>>().len();
                (full.null_count(), distinct, None, Some(text_summary(&values)))
            }
            VariableKind::Boolean => {
                let values: Vec<Option<bool>> = column.as_materialized_series().bool()?.into_iter().collect();
                let distinct = values.iter().flatten().collect::<HashSet<_>>().len();
                (full.null_count(), distinct, None, None)
            }
            VariableKind::Other => (full.null_count(), 0, None, None),
        };
        missing_cells += missing_full;

        let missing_percent = percent(missing_full, rows);
        let present = count - column.null_count();
        let profile = VariableProfile {
            name: name.to_string(),
            dtype: dtype.to_string(),
            kind,
            is_index: Some(name.as_str()) == index,
            count: rows,
            missing: missing_full,
            missing_percent,
            distinct,
            distinct_percent: percent(distinct, present),
            numeric,
            text,
        };
        alerts.extend(variable_alerts(&profile, count));
        variables.push(profile);
    }

    let correlations = if numeric_columns.len() >= 2 {
        let n = numeric_columns.len();
        let mut matrix = vec![vec![1.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let r = pearson(&numeric_columns[i].1, &numeric_columns[j].1);
                matrix[i][j] = r;
                matrix[j][i] = r;
                if r.abs() > CORRELATION_ALERT {
                    alerts.push(Alert {
                        kind: AlertKind::HighCorrelation,
                        column: Some(numeric_columns[i].0.clone()),
                        message: format!(
                            "{} is highly correlated with {} (r = {:.3})",
                            numeric_columns[i].0, numeric_columns[j].0, r
                        ),
                    });
                }
            }
        }
        Some(CorrelationMatrix {
            columns: numeric_columns.into_iter().map(|(n, _)| n).collect(),
            correlations: matrix,
        })
    } else {
        None
    };

    let duplicate_rows = duplicate_rows(df)?;
    if duplicate_rows > 0 {
        alerts.push(Alert {
            kind: AlertKind::Duplicates,
            column: None,
            message: format!(
                "dataset has {} ({:.1}%) duplicate rows",
                duplicate_rows,
                percent(duplicate_rows, rows)
            ),
        });
    }

    let count_kind = |k: VariableKind| variables.iter().filter(|v| v.kind == k).count();
    let overview = Overview {
        rows,
        columns: df.width(),
        missing_cells,
        missing_percent: percent(missing_cells, rows * df.width()),
        duplicate_rows,
        numeric_columns: count_kind(VariableKind::Numeric),
        text_columns: count_kind(VariableKind::Text),
        boolean_columns: count_kind(VariableKind::Boolean),
        sampled_rows: sampled.then_some(data.height()),
    };

    Ok(ProfileReport {
        generated_at: Local::now().to_rfc3339(),
        overview,
        variables,
        correlations,
        alerts,
    })
}

fn variable_alerts(v: &VariableProfile, sample_rows: usize) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut push = |kind, message: String| {
        alerts.push(Alert {
            kind,
            column: Some(v.name.clone()),
            message,
        })
    };
    if v.missing_percent > MISSING_ALERT * 100.0 {
        push(
            AlertKind::Missing,
            format!("{} has {} ({:.1}%) missing values", v.name, v.missing, v.missing_percent),
        );
    }
    if v.count > 0 && v.distinct == 1 {
        push(AlertKind::Constant, format!("{} has a constant value", v.name));
    } else if v.count > 1 && v.missing == 0 && v.distinct == sample_rows && v.kind != VariableKind::Boolean {
        push(AlertKind::Unique, format!("{} has unique values", v.name));
    }
    if let Some(num) = &v.numeric {
        let zeros = percent(num.zeros, sample_rows);
        if zeros > ZEROS_ALERT * 100.0 {
            push(
                AlertKind::Zeros,
                format!("{} has {} ({:.1}%) zeros", v.name, num.zeros, zeros),
            );
        }
        if num.skewness.abs() > SKEWNESS_ALERT {
            push(
                AlertKind::Skewed,
                format!("{} is highly skewed (γ1 = {:.2})", v.name, num.skewness),
            );
        }
        if num.infinite > 0 {
            push(
                AlertKind::Infinite,
                format!("{} has {} infinite values", v.name, num.infinite),
            );
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "NAME" => &["a", "b", "c", "d", "e"],
            "S" => &[0.0_f64, 1.0, 2.0, 3.0, 4.0],
            "BETX" => &[1.0_f64, f64::NAN, 3.0, 4.0, 5.0],
            "K" => &[7i64, 7, 7, 7, 7],
            "DUP" => &[2.0_f64, 4.0, 6.0, 8.0, 10.0],
        )
        .unwrap()
    }

    #[test]
    fn overview_counts() {
        let report = profile(&frame(), None, SAMPLING_THRESHOLD).unwrap();
        assert_eq!(report.overview.rows, 5);
        assert_eq!(report.overview.columns, 5);
        assert_eq!(report.overview.missing_cells, 1);
        assert_eq!(report.overview.numeric_columns, 4);
        assert_eq!(report.overview.text_columns, 1);
        assert_eq!(report.overview.duplicate_rows, 0);
        assert_eq!(report.overview.sampled_rows, None);
    }

    #[test]
    fn numeric_summary_values() {
        let report = profile(&frame(), Some("NAME"), SAMPLING_THRESHOLD).unwrap();
        let s = report.variable("S").unwrap().numeric.clone().unwrap();
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.median, 2.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.zeros, 1);
        assert_eq!(s.histogram.iter().sum::<usize>(), 5);
        assert!(report.variable("NAME").unwrap().is_index);
    }

    #[test]
    fn alerts_flag_constant_missing_and_correlation() {
        let report = profile(&frame(), None, SAMPLING_THRESHOLD).unwrap();
        assert!(report
            .alerts_of(AlertKind::Constant)
            .any(|a| a.column.as_deref() == Some("K")));
        assert!(report
            .alerts_of(AlertKind::Missing)
            .any(|a| a.column.as_deref() == Some("BETX")));
        assert!(report.alerts_of(AlertKind::HighCorrelation).count() >= 1);
        assert!(report
            .alerts_of(AlertKind::Unique)
            .any(|a| a.column.as_deref() == Some("NAME")));
    }

    #[test]
    fn duplicate_rows_are_counted() {
        let df = df!("A" => &[1i64, 1, 2], "B" => &["x", "x", "y"]).unwrap();
        let report = profile(&df, None, SAMPLING_THRESHOLD).unwrap();
        assert_eq!(report.overview.duplicate_rows, 1);
        assert_eq!(report.alerts_of(AlertKind::Duplicates).count(), 1);
    }

    #[test]
    fn large_tables_are_sampled() {
        let df = df!("A" => (0..1000).map(|i| i as f64).collect::<Vec<_>>()).unwrap();
        let report = profile(&df, None, 100).unwrap();
        assert_eq!(report.overview.rows, 1000);
        assert_eq!(report.overview.sampled_rows, Some(100));
    }

    #[test]
    fn report_serializes() {
        let report = profile(&frame(), None, SAMPLING_THRESHOLD).unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"overview\""));
        assert!(json.contains("\"constant\""));
    }
}
