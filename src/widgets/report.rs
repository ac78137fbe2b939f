//! Scrollable text rendering of a profiling report.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::profile::{ProfileReport, VariableProfile};
use crate::widgets::datatable::format_float;

/// Report lines, built once per report and scrolled by the view.
pub fn report_lines(report: &ProfileReport, accent: Color) -> Vec<Line<'static>> {
    let heading = |text: String| {
        Line::from(Span::styled(
            text,
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ))
    };
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("  {:<20}", name), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ])
    };

    let o = &report.overview;
    let mut lines = vec![heading("Overview".to_string())];
    lines.push(field("Rows", o.rows.to_string()));
    lines.push(field("Columns", o.columns.to_string()));
    lines.push(field(
        "Missing cells",
        format!("{} ({:.1}%)", o.missing_cells, o.missing_percent),
    ));
    lines.push(field("Duplicate rows", o.duplicate_rows.to_string()));
    lines.push(field(
        "Column kinds",
        format!(
            "{} numeric, {} text, {} boolean",
            o.numeric_columns, o.text_columns, o.boolean_columns
        ),
    ));
    if let Some(sampled) = o.sampled_rows {
        lines.push(field("Sampled rows", sampled.to_string()));
    }
    lines.push(Line::default());

    if !report.alerts.is_empty() {
        lines.push(heading(format!("Alerts ({})", report.alerts.len())));
        for alert in &report.alerts {
            lines.push(Line::from(vec![
                Span::styled("  ! ", Style::default().fg(Color::Yellow)),
                Span::raw(alert.message.clone()),
            ]));
        }
        lines.push(Line::default());
    }

    lines.push(heading("Variables".to_string()));
    for variable in &report.variables {
        variable_lines(variable, &mut lines, &field);
    }

    if let Some(corr) = &report.correlations {
        lines.push(heading("Correlations (Pearson)".to_string()));
        let width = corr.columns.iter().map(|c| c.len()).max().unwrap_or(0).max(6);
        let header: String = std::iter::once(format!("  {:width$}", "", width = width))
            .chain(corr.columns.iter().map(|c| format!(" {:>8.8}", c)))
            .collect();
        lines.push(Line::from(header));
        for (name, row) in corr.columns.iter().zip(&corr.correlations) {
            let mut spans = vec![Span::raw(format!("  {:width$}", name, width = width))];
            for &v in row {
                let style = if v.is_finite() && v.abs() >= 0.9 {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                let text = if v.is_finite() { format!("{:.3}", v) } else { "-".to_string() };
                spans.push(Span::styled(format!(" {:>8}", text), style));
            }
            lines.push(Line::from(spans));
        }
    }
    lines
}

fn variable_lines(
    v: &VariableProfile,
    lines: &mut Vec<Line<'static>>,
    field: &dyn Fn(&str, String) -> Line<'static>,
) {
    let title = if v.is_index {
        format!("{} [{}] (index)", v.name, v.dtype)
    } else {
        format!("{} [{}]", v.name, v.dtype)
    };
    lines.push(Line::from(Span::styled(
        title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(field(
        "Missing",
        format!("{} ({:.1}%)", v.missing, v.missing_percent),
    ));
    lines.push(field(
        "Distinct",
        format!("{} ({:.1}%)", v.distinct, v.distinct_percent),
    ));
    if let Some(n) = &v.numeric {
        lines.push(field(
            "Mean / Std",
            format!("{} / {}", format_float(n.mean), format_float(n.std)),
        ));
        lines.push(field(
            "Min / Max",
            format!("{} / {}", format_float(n.min), format_float(n.max)),
        ));
        lines.push(field(
            "5% / 25% / 50%",
            format!(
                "{} / {} / {}",
                format_float(n.p5),
                format_float(n.q25),
                format_float(n.median)
            ),
        ));
        lines.push(field(
            "75% / 95%",
            format!("{} / {}", format_float(n.q75), format_float(n.p95)),
        ));
        lines.push(field(
            "Skew / Kurtosis",
            format!("{:.3} / {:.3}", n.skewness, n.kurtosis),
        ));
        lines.push(field(
            "Zeros / Negative",
            format!("{} / {}", n.zeros, n.negatives),
        ));
        lines.push(field(
            "Inf / IQR outliers",
            format!("{} / {}", n.infinite, n.outliers_iqr),
        ));
        if !n.histogram.is_empty() {
            lines.push(field("Distribution", sparkline(&n.histogram)));
        }
    }
    if let Some(t) = &v.text {
        if let Some(mode) = &t.mode {
            lines.push(field("Most frequent", mode.clone()));
        }
        let top: Vec<String> = t
            .top_values
            .iter()
            .map(|(value, count)| format!("{} ({})", value, count))
            .collect();
        if !top.is_empty() {
            lines.push(field("Top values", top.join(", ")));
        }
        lines.push(field(
            "Length min/mean/max",
            format!("{} / {:.1} / {}", t.min_length, t.mean_length, t.max_length),
        ));
    }
    lines.push(Line::default());
}

/// Block-character sparkline of bin counts.
pub fn sparkline(counts: &[usize]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max = counts.iter().copied().max().unwrap_or(0);
    counts
        .iter()
        .map(|&c| {
            if max == 0 {
                BARS[0]
            } else {
                BARS[(c * (BARS.len() - 1)) / max]
            }
        })
        .collect()
}

pub struct ReportView<'a> {
    lines: &'a [Line<'static>],
    scroll: u16,
    border: Color,
}

impl<'a> ReportView<'a> {
    pub fn new(lines: &'a [Line<'static>], scroll: u16, border: Color) -> Self {
        Self {
            lines,
            scroll,
            border,
        }
    }
}

impl Widget for ReportView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.lines.to_vec())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.border))
                    .title(" Profiling report (j/k scroll) "),
            )
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkline_scales_to_max() {
        assert_eq!(sparkline(&[0, 4, 8]), "▁▄█");
        assert_eq!(sparkline(&[0, 0]), "▁▁");
    }
}
