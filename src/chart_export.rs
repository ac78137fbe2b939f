//! Chart export to PNG (plotters bitmap) and SVG (plotters svg).

use color_eyre::eyre::eyre;
use color_eyre::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::chart_data::{DensityData, HistogramData, ScatterData};
use crate::colormap::{self, Rgb};
use crate::options::{ContourStyle, Marginal, ScatterMode};

/// Export format for charts: PNG or SVG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExportFormat {
    Png,
    Svg,
}

impl ChartExportFormat {
    pub const ALL: [Self; 2] = [Self::Png, Self::Svg];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Svg => "SVG",
        }
    }

    /// Format implied by the path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }
}

/// A prepared chart, borrowed for export.
#[derive(Debug, Clone, Copy)]
pub enum ExportChart<'a> {
    Scatter(&'a ScatterData),
    Histogram(&'a HistogramData),
    Density(&'a DensityData),
}

impl ExportChart<'_> {
    fn is_empty(&self) -> bool {
        match self {
            ExportChart::Scatter(d) => d.is_empty(),
            ExportChart::Histogram(d) => d.is_empty(),
            ExportChart::Density(d) => d.is_empty(),
        }
    }
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

/// Write `chart` to `path` with the given pixel size.
pub fn write_chart(
    path: &Path,
    format: ChartExportFormat,
    chart: ExportChart<'_>,
    size: (u32, u32),
) -> Result<()> {
    if chart.is_empty() {
        return Err(eyre!("No data to export"));
    }
    match format {
        ChartExportFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw(&root, chart)?;
            root.present()?;
        }
        ChartExportFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw(&root, chart)?;
            root.present()?;
        }
    }
    Ok(())
}

fn draw<DB>(root: &DrawingArea<DB, Shift>, chart: ExportChart<'_>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    match chart {
        ExportChart::Scatter(data) => draw_scatter(root, data),
        ExportChart::Histogram(data) => draw_histogram(root, data),
        ExportChart::Density(data) => draw_density(root, data),
    }
}

fn draw_scatter<DB>(root: &DrawingArea<DB, Shift>, data: &ScatterData) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_min, x_max, y_min, y_max) = data.bounds().ok_or_else(|| eyre!("No data to export"))?;
    let y_label = data
        .series
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(data.x_label.as_str())
        .y_desc(y_label.as_str())
        .draw()?;

    for (idx, s) in data.series.iter().enumerate() {
        if s.points.is_empty() {
            continue;
        }
        let color = rgb(colormap::series_color(idx));
        if let Some(errs) = &s.err_y {
            chart.draw_series(s.points.iter().zip(errs).map(|(&(x, y), &e)| {
                ErrorBar::new_vertical(x, y - e, y, y + e, color.stroke_width(1), 6)
            }))?;
        }
        if let Some(errs) = &s.err_x {
            chart.draw_series(s.points.iter().zip(errs).map(|(&(x, y), &e)| {
                ErrorBar::new_horizontal(y, x - e, x, x + e, color.stroke_width(1), 6)
            }))?;
        }
        if matches!(data.mode, ScatterMode::Lines | ScatterMode::LinesMarkers) {
            chart
                .draw_series(LineSeries::new(s.points.iter().copied(), color))?
                .label(s.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        if matches!(data.mode, ScatterMode::Markers | ScatterMode::LinesMarkers) {
            let series = chart.draw_series(
                s.points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
            )?;
            if data.mode == ScatterMode::Markers {
                series
                    .label(s.name.as_str())
                    .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_histogram<DB>(root: &DrawingArea<DB, Shift>, data: &HistogramData) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_min, x_max) = data.range.ok_or_else(|| eyre!("No data to export"))?;
    let y_max = data.max_value() * 1.05;
    let (_, height) = root.dim_in_pixel();
    let (upper, lower) = root.split_vertically(height / 5);

    let mut marginal = ChartBuilder::on(&upper)
        .margin(10)
        .margin_left(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..data.series.len().max(1) as f64)?;
    for (idx, s) in data.series.iter().enumerate() {
        let color = rgb(colormap::series_color(idx));
        let mid = idx as f64 + 0.5;
        match data.marginal {
            Marginal::Box => {
                if let Some(sm) = s.summary {
                    marginal.draw_series(std::iter::once(Rectangle::new(
                        [(sm.q1, mid - 0.3), (sm.q3, mid + 0.3)],
                        color.mix(0.4).filled(),
                    )))?;
                    marginal.draw_series(
                        [
                            vec![(sm.median, mid - 0.3), (sm.median, mid + 0.3)],
                            vec![(sm.lower_whisker, mid), (sm.q1, mid)],
                            vec![(sm.q3, mid), (sm.upper_whisker, mid)],
                        ]
                        .into_iter()
                        .map(|pts| PathElement::new(pts, color.stroke_width(2))),
                    )?;
                }
            }
            Marginal::Violin => {
                let peak = s.violin.iter().map(|p| p.1).fold(0.0, f64::max);
                if peak > 0.0 {
                    let mut outline: Vec<(f64, f64)> = s
                        .violin
                        .iter()
                        .map(|&(x, d)| (x, mid + 0.45 * d / peak))
                        .collect();
                    outline.extend(s.violin.iter().rev().map(|&(x, d)| (x, mid - 0.45 * d / peak)));
                    marginal.draw_series(std::iter::once(Polygon::new(
                        outline,
                        color.mix(0.5).filled(),
                    )))?;
                }
            }
            Marginal::Rug => {
                marginal.draw_series(s.rug.iter().map(|&v| {
                    PathElement::new(vec![(v, mid - 0.4), (v, mid + 0.4)], color)
                }))?;
            }
        }
    }

    let mut chart = ChartBuilder::on(&lower)
        .margin(10)
        .margin_left(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max.max(f64::MIN_POSITIVE))?;
    chart
        .configure_mesh()
        .y_desc(data.normalization.axis_label())
        .draw()?;
    for (idx, s) in data.series.iter().enumerate() {
        let color = rgb(colormap::series_color(idx));
        chart
            .draw_series(s.bins.iter().map(|b| {
                Rectangle::new([(b.lo, 0.0), (b.hi, b.value)], color.mix(0.5).filled())
            }))?
            .label(s.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_density<DB>(root: &DrawingArea<DB, Shift>, data: &DensityData) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_min, x_max) = match (data.x_edges.first(), data.x_edges.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => return Err(eyre!("No data to export")),
    };
    let (y_min, y_max) = match (data.y_edges.first(), data.y_edges.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => return Err(eyre!("No data to export")),
    };
    let cmap = data.scale.colormap();
    let level_color = |k: usize| {
        let t = (k + 1) as f64 / (data.levels.len() + 1) as f64;
        rgb(cmap.sample_directed(t, data.reversed))
    };

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(data.x_label.as_str())
        .y_desc(data.y_label.as_str())
        .draw()?;

    let cells = data.counts.iter().enumerate().flat_map(|(j, row)| {
        row.iter().enumerate().map(move |(i, &count)| (i, j, count))
    });
    match data.style {
        ContourStyle::Heatmap => {
            chart.draw_series(cells.filter(|c| c.2 > 0.0).map(|(i, j, count)| {
                let t = colormap::normalize(count, 0.0, data.max_count);
                Rectangle::new(
                    [
                        (data.x_edges[i], data.y_edges[j]),
                        (data.x_edges[i + 1], data.y_edges[j + 1]),
                    ],
                    rgb(cmap.sample_directed(t, data.reversed)).filled(),
                )
            }))?;
        }
        ContourStyle::Fill => {
            chart.draw_series(cells.filter_map(|(i, j, count)| {
                let band = data.band(count)?;
                Some(Rectangle::new(
                    [
                        (data.x_edges[i], data.y_edges[j]),
                        (data.x_edges[i + 1], data.y_edges[j + 1]),
                    ],
                    level_color(band).filled(),
                ))
            }))?;
        }
        ContourStyle::Lines | ContourStyle::None => {}
    }

    for (k, line) in data.contours.iter().enumerate() {
        let color = match data.style {
            ContourStyle::None => BLACK,
            ContourStyle::Heatmap | ContourStyle::Fill => RGBColor(90, 90, 90),
            ContourStyle::Lines => level_color(k),
        };
        chart.draw_series(
            line.segments
                .iter()
                .map(|&(a, b)| PathElement::new(vec![a, b], color.stroke_width(1))),
        )?;
    }
    Ok(())
}

/// Default output path for an export: `<stem>_<chart>.<ext>` in the working directory.
pub fn default_export_path(stem: &str, chart: &str, format: ChartExportFormat) -> std::path::PathBuf {
    let stem = Path::new(stem)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chart".to_string());
    std::path::PathBuf::from(format!("{}_{}.{}", stem, chart, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ScatterMode;

    #[test]
    fn format_from_path() {
        assert_eq!(
            ChartExportFormat::from_path(Path::new("a.PNG")),
            Some(ChartExportFormat::Png)
        );
        assert_eq!(
            ChartExportFormat::from_path(Path::new("a.svg")),
            Some(ChartExportFormat::Svg)
        );
        assert_eq!(ChartExportFormat::from_path(Path::new("a.eps")), None);
    }

    #[test]
    fn empty_chart_is_not_exported() {
        let data = ScatterData {
            x_label: "S".into(),
            mode: ScatterMode::Lines,
            series: Vec::new(),
            warnings: Vec::new(),
        };
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("chart.svg");
        let result = write_chart(
            &path,
            ChartExportFormat::Svg,
            ExportChart::Scatter(&data),
            (640, 480),
        );
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn default_path_uses_file_stem() {
        assert_eq!(
            default_export_path("twiss.tfs", "scatter", ChartExportFormat::Png),
            std::path::PathBuf::from("twiss_scatter.png")
        );
    }
}
