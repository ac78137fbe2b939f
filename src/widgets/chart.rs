//! Chart view widget: options sidebar and a canvas-drawn chart area.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Context, Line as CanvasLine, Points, Rectangle},
        Block, Borders, List, ListItem, Paragraph, Widget,
    },
};

use crate::chart_data::{DensityData, HistogramData, ScatterData};
use crate::chart_forms::{ChartForms, ChartKind};
use crate::colormap::{self, Rgb};
use crate::config::{ColorParser, Theme};
use crate::options::{ContourStyle, Marginal, ScatterMode};

const SIDEBAR_WIDTH: u16 = 38;
const LABEL_WIDTH: u16 = 15;
const Y_GUTTER: u16 = 10;

/// Prepared data for the chart currently shown.
#[derive(Debug, Clone, Copy)]
pub enum ChartContent<'a> {
    Scatter(Option<&'a ScatterData>),
    Histogram(Option<&'a HistogramData>),
    Density(Option<&'a DensityData>),
}

/// Renders the chart view: title row, left sidebar with the form of `kind`, and the chart.
pub fn render_chart_view(
    area: Rect,
    buf: &mut Buffer,
    forms: &ChartForms,
    editing: bool,
    content: ChartContent<'_>,
    theme: &Theme,
    colors: &ColorParser,
) {
    let kind = match content {
        ChartContent::Scatter(_) => ChartKind::Scatter,
        ChartContent::Histogram(_) => ChartKind::Histogram,
        ChartContent::Density(_) => ChartKind::Density,
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Fill(1)])
        .split(area);

    let title = if editing {
        format!("{} (editing: Enter apply, Esc cancel)", capitalize(kind.as_str()))
    } else {
        format!("{} (Enter to edit options, e to export)", capitalize(kind.as_str()))
    };
    Paragraph::new(title)
        .style(
            Style::default()
                .fg(theme.get("table_header"))
                .bg(theme.get("controls_bg")),
        )
        .render(layout[0], buf);

    let main_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
        .split(layout[1]);

    render_sidebar(main_layout[0], buf, forms, kind, editing, theme);

    let chart_area = main_layout[1];
    let empty = |buf: &mut Buffer, msg: &str| {
        Paragraph::new(msg)
            .style(Style::default().fg(theme.get("text_secondary")))
            .centered()
            .render(chart_area, buf);
    };
    match content {
        ChartContent::Scatter(Some(data)) if !data.is_empty() => {
            render_scatter(chart_area, buf, data, theme, colors)
        }
        ChartContent::Histogram(Some(data)) if !data.is_empty() => {
            render_histogram(chart_area, buf, data, theme, colors)
        }
        ChartContent::Density(Some(data)) if !data.is_empty() => {
            render_density(chart_area, buf, data, theme, colors)
        }
        ChartContent::Scatter(Some(_))
        | ChartContent::Histogram(Some(_))
        | ChartContent::Density(Some(_)) => empty(buf, "No valid data points"),
        _ => empty(buf, "Select columns in the sidebar (Enter to edit)"),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_sidebar(
    area: Rect,
    buf: &mut Buffer,
    forms: &ChartForms,
    kind: ChartKind,
    editing: bool,
    theme: &Theme,
) {
    let border_color = theme.get("modal_border");
    let active_color = theme.get("modal_border_active");
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { active_color } else { border_color }))
        .title(" Options ");
    let inner = block.inner(area);
    block.render(area, buf);

    let fields = kind.fields();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(fields.len() as u16),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .split(inner);

    let focused = forms.focused(kind);
    let lines: Vec<Line> = fields
        .iter()
        .map(|&field| {
            let is_focused = editing && field == focused;
            let label_style = if is_focused {
                Style::default().fg(active_color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.get("text_secondary"))
            };
            Line::from(vec![
                Span::styled(
                    format!("{:<width$}", field.label(), width = LABEL_WIDTH as usize),
                    label_style,
                ),
                Span::styled(
                    forms.value_text(kind, field),
                    Style::default().fg(theme.get("text_primary")),
                ),
            ])
        })
        .collect();
    Paragraph::new(lines).render(layout[0], buf);

    if !(editing && focused.is_column()) {
        return;
    }
    // Candidate strip for the focused column field
    let selected = forms.selected(kind, focused);
    let visible = layout[2].height as usize;
    let skip = forms.cursor.saturating_sub(visible.saturating_sub(1));
    let items: Vec<ListItem> = forms
        .columns
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, name)| {
            let mark = if selected.contains(&name.as_str()) { "[x]" } else { "[ ]" };
            let style = if i == forms.cursor {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(format!("{} {}", mark, name), style)))
        })
        .collect();
    List::new(items)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(border_color))
                .title(" Space toggles "),
        )
        .render(layout[2], buf);
}

/// Draws axis labels around `area` and returns the plotting rectangle.
fn render_axes(
    area: Rect,
    buf: &mut Buffer,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    labels: (&str, &str),
    theme: &Theme,
) -> Rect {
    let style = Style::default().fg(theme.get("text_primary"));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(1), Constraint::Length(1)])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(Y_GUTTER), Constraint::Fill(1)])
        .split(rows[0]);
    let plot = cols[1];

    let gutter = cols[0];
    if gutter.height > 0 {
        let mid = gutter.y + gutter.height / 2;
        for (y, v) in [
            (gutter.y, y_bounds[1]),
            (mid, (y_bounds[0] + y_bounds[1]) / 2.0),
            (gutter.bottom().saturating_sub(1), y_bounds[0]),
        ] {
            let text = format!("{:>width$}", format_axis_label(v), width = Y_GUTTER as usize - 1);
            buf.set_string(gutter.x, y, text, style);
        }
    }

    let x_row = Rect::new(plot.x, rows[1].y, plot.width, 1);
    let lo = format_axis_label(x_bounds[0]);
    let mid = format_axis_label((x_bounds[0] + x_bounds[1]) / 2.0);
    let hi = format_axis_label(x_bounds[1]);
    buf.set_string(x_row.x, x_row.y, &lo, style);
    let mid_x = x_row.x + (x_row.width / 2).saturating_sub(mid.len() as u16 / 2);
    buf.set_string(mid_x, x_row.y, &mid, style);
    let hi_x = x_row.right().saturating_sub(hi.len() as u16);
    buf.set_string(hi_x, x_row.y, &hi, style);

    let caption = Line::from(vec![
        Span::styled(labels.0.to_string(), style.add_modifier(Modifier::BOLD)),
        Span::raw("  vs  "),
        Span::styled(labels.1.to_string(), style),
    ]);
    Paragraph::new(caption).centered().render(rows[2], buf);
    plot
}

fn terminal(colors: &ColorParser, rgb: Rgb) -> Color {
    colors.terminal_color(rgb)
}

fn render_scatter(area: Rect, buf: &mut Buffer, data: &ScatterData, theme: &Theme, colors: &ColorParser) {
    let Some((x0, x1, y0, y1)) = data.bounds() else {
        return;
    };
    let names: Vec<&str> = data.series.iter().map(|s| s.name.as_str()).collect();
    let y_label = names.join(", ");
    let plot = render_axes(area, buf, [x0, x1], [y0, y1], (&data.x_label, &y_label), theme);
    let mode = data.mode;
    Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([x0, x1])
        .y_bounds([y0, y1])
        .paint(|ctx| {
            for (idx, s) in data.series.iter().enumerate() {
                let color = terminal(colors, colormap::series_color(idx));
                for (i, &(x, y)) in s.points.iter().enumerate() {
                    if let Some(ex) = s.err_x.as_ref().map(|e| e[i].abs()) {
                        ctx.draw(&CanvasLine::new(x - ex, y, x + ex, y, color));
                    }
                    if let Some(ey) = s.err_y.as_ref().map(|e| e[i].abs()) {
                        ctx.draw(&CanvasLine::new(x, y - ey, x, y + ey, color));
                    }
                }
                if matches!(mode, ScatterMode::Lines | ScatterMode::LinesMarkers) {
                    for pair in s.points.windows(2) {
                        ctx.draw(&CanvasLine::new(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color));
                    }
                }
                if matches!(mode, ScatterMode::Markers | ScatterMode::LinesMarkers) {
                    ctx.draw(&Points {
                        coords: &s.points,
                        color,
                    });
                }
            }
            legend(ctx, &names, colors, x0, y1);
        })
        .render(plot, buf);
}

fn legend(ctx: &mut Context<'_>, names: &[&str], colors: &ColorParser, x: f64, y: f64) {
    ctx.layer();
    let spans: Vec<Span> = names
        .iter()
        .enumerate()
        .flat_map(|(idx, name)| {
            let color = terminal(colors, colormap::series_color(idx));
            [
                Span::styled("■ ", Style::default().fg(color)),
                Span::raw(format!("{}  ", name)),
            ]
        })
        .collect();
    ctx.print(x, y, Line::from(spans));
}

fn render_histogram(
    area: Rect,
    buf: &mut Buffer,
    data: &HistogramData,
    theme: &Theme,
    colors: &ColorParser,
) {
    let Some((x0, x1)) = data.range else {
        return;
    };
    let split = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(20), Constraint::Fill(1)])
        .split(area);
    let n = data.series.len().max(1) as f64;

    let marginal_plot = Rect {
        x: split[0].x + Y_GUTTER,
        width: split[0].width.saturating_sub(Y_GUTTER),
        ..split[0]
    };
    Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([x0, x1])
        .y_bounds([0.0, n])
        .paint(|ctx| {
            for (idx, s) in data.series.iter().enumerate() {
                let color = terminal(colors, colormap::series_color(idx));
                let mid = idx as f64 + 0.5;
                match data.marginal {
                    Marginal::Box => {
                        if let Some(sm) = s.summary {
                            ctx.draw(&Rectangle {
                                x: sm.q1,
                                y: mid - 0.3,
                                width: sm.q3 - sm.q1,
                                height: 0.6,
                                color,
                            });
                            ctx.draw(&CanvasLine::new(sm.median, mid - 0.3, sm.median, mid + 0.3, color));
                            ctx.draw(&CanvasLine::new(sm.lower_whisker, mid, sm.q1, mid, color));
                            ctx.draw(&CanvasLine::new(sm.q3, mid, sm.upper_whisker, mid, color));
                        }
                    }
                    Marginal::Violin => {
                        let peak = s.violin.iter().map(|p| p.1).fold(0.0, f64::max);
                        if peak > 0.0 {
                            for pair in s.violin.windows(2) {
                                let (a, b) = (pair[0], pair[1]);
                                let (ha, hb) = (0.45 * a.1 / peak, 0.45 * b.1 / peak);
                                ctx.draw(&CanvasLine::new(a.0, mid + ha, b.0, mid + hb, color));
                                ctx.draw(&CanvasLine::new(a.0, mid - ha, b.0, mid - hb, color));
                            }
                        }
                    }
                    Marginal::Rug => {
                        for &v in &s.rug {
                            ctx.draw(&CanvasLine::new(v, mid - 0.4, v, mid + 0.4, color));
                        }
                    }
                }
            }
        })
        .render(marginal_plot, buf);

    let y_max = (data.max_value() * 1.05).max(f64::MIN_POSITIVE);
    let names: Vec<&str> = data.series.iter().map(|s| s.name.as_str()).collect();
    let plot = render_axes(
        split[1],
        buf,
        [x0, x1],
        [0.0, y_max],
        (&names.join(", "), data.normalization.axis_label()),
        theme,
    );
    // Two braille dots per cell horizontally
    let step = (x1 - x0) / (plot.width.max(1) as f64 * 2.0);
    Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([x0, x1])
        .y_bounds([0.0, y_max])
        .paint(|ctx| {
            for (idx, s) in data.series.iter().enumerate() {
                let color = terminal(colors, colormap::series_color(idx));
                for bin in &s.bins {
                    let mut x = bin.lo;
                    while x < bin.hi {
                        ctx.draw(&CanvasLine::new(x, 0.0, x, bin.value, color));
                        x += step;
                    }
                }
                // Series drawn later cover earlier ones
                ctx.layer();
            }
            legend(ctx, &names, colors, x0, y_max);
        })
        .render(plot, buf);
}

fn render_density(area: Rect, buf: &mut Buffer, data: &DensityData, theme: &Theme, colors: &ColorParser) {
    let (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) = (
        data.x_edges.first(),
        data.x_edges.last(),
        data.y_edges.first(),
        data.y_edges.last(),
    ) else {
        return;
    };
    let plot = render_axes(
        area,
        buf,
        [x0, x1],
        [y0, y1],
        (&data.x_label, &data.y_label),
        theme,
    );
    let cmap = data.scale.colormap();
    let level_color = |k: usize| {
        let t = (k + 1) as f64 / (data.levels.len() + 1) as f64;
        cmap.sample_directed(t, data.reversed)
    };
    let line_color = |k: usize| match data.style {
        ContourStyle::None => theme.get("text_primary"),
        ContourStyle::Heatmap | ContourStyle::Fill => Color::Indexed(244),
        ContourStyle::Lines => terminal(colors, level_color(k)),
    };

    Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([x0, x1])
        .y_bounds([y0, y1])
        .paint(|ctx| {
            for (k, line) in data.contours.iter().enumerate() {
                let color = line_color(k);
                for &((ax, ay), (bx, by)) in &line.segments {
                    ctx.draw(&CanvasLine::new(ax, ay, bx, by, color));
                }
            }
        })
        .render(plot, buf);

    if !matches!(data.style, ContourStyle::Heatmap | ContourStyle::Fill) {
        return;
    }
    // Cell backgrounds go on after the canvas so its glyphs stay visible
    let nx = data.x_edges.len().saturating_sub(1);
    let ny = data.y_edges.len().saturating_sub(1);
    if nx == 0 || ny == 0 || plot.width == 0 || plot.height == 0 {
        return;
    }
    for row in 0..plot.height {
        let fy = 1.0 - (row as f64 + 0.5) / plot.height as f64;
        let j = ((fy * ny as f64) as usize).min(ny - 1);
        for col in 0..plot.width {
            let fx = (col as f64 + 0.5) / plot.width as f64;
            let i = ((fx * nx as f64) as usize).min(nx - 1);
            let count = data.counts[j][i];
            let rgb = match data.style {
                ContourStyle::Heatmap if count > 0.0 => Some(cmap.sample_directed(
                    colormap::normalize(count, 0.0, data.max_count),
                    data.reversed,
                )),
                ContourStyle::Fill => data.band(count).map(level_color),
                _ => None,
            };
            if let Some(rgb) = rgb {
                buf[(plot.x + col, plot.y + row)].set_bg(terminal(colors, rgb));
            }
        }
    }
}

pub fn format_axis_label(v: f64) -> String {
    if v.abs() >= 1e6 || (v.abs() < 1e-2 && v != 0.0) {
        format!("{:.2e}", v)
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_data::ScatterSeries;
    use crate::config::ThemeConfig;
    use crate::options::{BinCount, FigureHeight};

    #[test]
    fn axis_labels_switch_to_scientific() {
        assert_eq!(format_axis_label(1.5), "1.50");
        assert_eq!(format_axis_label(0.0), "0.00");
        assert_eq!(format_axis_label(2.5e7), "2.50e7");
        assert_eq!(format_axis_label(0.001), "1.00e-3");
    }

    #[test]
    fn scatter_view_renders_without_panicking() {
        let theme = Theme::from_config(&ThemeConfig::default()).unwrap();
        let colors = ColorParser::new();
        let forms = ChartForms::new(BinCount::default(), FigureHeight::default());
        let data = ScatterData {
            x_label: "S".into(),
            mode: ScatterMode::LinesMarkers,
            series: vec![ScatterSeries {
                name: "BETX".into(),
                points: vec![(0.0, 1.0), (1.0, 3.0), (2.0, 2.0)],
                err_x: None,
                err_y: Some(vec![0.1, 0.2, 0.1]),
            }],
            warnings: Vec::new(),
        };
        let area = Rect::new(0, 0, 100, 30);
        let mut buf = Buffer::empty(area);
        render_chart_view(
            area,
            &mut buf,
            &forms,
            true,
            ChartContent::Scatter(Some(&data)),
            &theme,
            &colors,
        );
        let top: String = (0..area.width).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert!(top.starts_with("Scatter"), "{}", top);
    }
}
