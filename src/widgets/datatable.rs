use std::borrow::Cow;

use polars::prelude::*;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Cell, Row, StatefulWidget, Table, TableState},
};

use crate::colormap::{normalize, Colormap, Rgb};
use crate::query::FilteredView;

/// Scroll position of the data table.
#[derive(Debug, Default)]
pub struct DataTableState {
    pub start_row: usize,
    /// First scrollable (non-index) column shown.
    pub start_col: usize,
    pub visible_rows: usize,
    pub table_state: TableState,
}

impl DataTableState {
    pub fn reset(&mut self) {
        self.start_row = 0;
        self.start_col = 0;
        self.table_state.select(None);
    }

    pub fn scroll_down(&mut self, rows: usize, total: usize) {
        self.start_row = (self.start_row + rows).min(total.saturating_sub(1));
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.start_row = self.start_row.saturating_sub(rows);
    }

    pub fn scroll_right(&mut self, columns: usize) {
        self.start_col = (self.start_col + 1).min(columns.saturating_sub(1));
    }

    pub fn scroll_left(&mut self) {
        self.start_col = self.start_col.saturating_sub(1);
    }

    pub fn end(&mut self, total: usize) {
        self.start_row = total.saturating_sub(self.visible_rows.max(1));
    }
}

/// Per-column value range used for the colormap gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

/// Finite min/max of every numeric column, `None` for other columns.
pub fn column_ranges(df: &DataFrame) -> Vec<Option<ColumnRange>> {
    df.get_columns()
        .iter()
        .map(|column| {
            if !column.dtype().is_numeric() {
                return None;
            }
            let cast = column.cast(&DataType::Float64).ok()?;
            let values = cast.f64().ok()?;
            let (min, max) = values
                .into_iter()
                .flatten()
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            (min <= max).then_some(ColumnRange { min, max })
        })
        .collect()
}

fn is_missing(value: &AnyValue) -> bool {
    match value {
        AnyValue::Null => true,
        AnyValue::Float64(v) => v.is_nan(),
        AnyValue::Float32(v) => v.is_nan(),
        _ => false,
    }
}

fn as_f64(value: &AnyValue) -> Option<f64> {
    match value {
        AnyValue::Null | AnyValue::Boolean(_) => None,
        other => other.extract::<f64>(),
    }
}

fn cell_text(value: &AnyValue) -> Cow<'static, str> {
    match value {
        AnyValue::Null => Cow::Borrowed("null"),
        AnyValue::Float64(v) => Cow::Owned(format_float(*v)),
        AnyValue::Float32(v) => Cow::Owned(format_float(*v as f64)),
        other => Cow::Owned(other.str_value().into_owned()),
    }
}

/// Compact float text: plain for moderate magnitudes, scientific otherwise.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if v == 0.0 || (1e-4..1e7).contains(&v.abs()) {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        format!("{:.6e}", v)
    }
}

/// Renders a filtered view with the index column pinned first.
pub struct DataTable<'a> {
    view: &'a FilteredView,
    ranges: &'a [Option<ColumnRange>],
    colormap: Option<Colormap>,
    /// Maps colormap colours to what the terminal can show.
    terminal_color: &'a dyn Fn(Rgb) -> Color,
    pub header_fg: Color,
    pub header_bg: Color,
    pub null_fg: Color,
    pub max_column_width: u16,
}

impl<'a> DataTable<'a> {
    pub fn new(
        view: &'a FilteredView,
        ranges: &'a [Option<ColumnRange>],
        terminal_color: &'a dyn Fn(Rgb) -> Color,
    ) -> Self {
        Self {
            view,
            ranges,
            colormap: None,
            terminal_color,
            header_fg: Color::White,
            header_bg: Color::Indexed(236),
            null_fg: Color::Red,
            max_column_width: 24,
        }
    }

    pub fn with_colormap(mut self, colormap: Option<Colormap>) -> Self {
        self.colormap = colormap;
        self
    }

    pub fn with_colors(mut self, header_fg: Color, header_bg: Color, null_fg: Color) -> Self {
        self.header_fg = header_fg;
        self.header_bg = header_bg;
        self.null_fg = null_fg;
        self
    }

    pub fn with_max_column_width(mut self, width: u16) -> Self {
        self.max_column_width = width.max(4);
        self
    }

    /// Column positions in display order: index first, then scrollable columns from `start_col`.
    fn display_columns(&self, start_col: usize) -> Vec<usize> {
        let df = &self.view.data;
        let index_pos = self
            .view
            .index
            .as_deref()
            .and_then(|name| df.get_column_index(name));
        let rest = (0..df.width()).filter(|i| Some(*i) != index_pos).skip(start_col);
        index_pos.into_iter().chain(rest).collect()
    }

    fn cell_style(&self, position: usize, value: &AnyValue) -> Style {
        if is_missing(value) {
            return Style::default().fg(self.null_fg);
        }
        let (Some(colormap), Some(Some(range)), Some(v)) = (
            self.colormap,
            self.ranges.get(position),
            as_f64(value),
        ) else {
            return Style::default();
        };
        if !v.is_finite() {
            return Style::default();
        }
        let bg = colormap.sample(normalize(v, range.min, range.max));
        Style::default()
            .bg((self.terminal_color)(bg))
            .fg((self.terminal_color)(bg.contrasting_text()))
    }
}

impl StatefulWidget for DataTable<'_> {
    type State = DataTableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let df = &self.view.data;
        state.visible_rows = area.height.saturating_sub(1) as usize;
        let rows_shown = state
            .visible_rows
            .min(df.height().saturating_sub(state.start_row));
        let visible = df.slice(state.start_row as i64, rows_shown);
        let index_name = self.view.index.as_deref();

        let mut widths = Vec::new();
        let mut columns = Vec::new();
        let mut used: u16 = 0;
        for position in self.display_columns(state.start_col) {
            let column = &visible.get_columns()[position];
            let name = column.name().as_str();
            let texts: Vec<(Cow<str>, Style)> = (0..visible.height())
                .map(|row| {
                    let value = column.get(row).unwrap_or(AnyValue::Null);
                    (cell_text(&value), self.cell_style(position, &value))
                })
                .collect();
            let width = texts
                .iter()
                .map(|(t, _)| t.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
                .min(self.max_column_width as usize) as u16;
            if used > 0 && used + width > area.width {
                break;
            }
            used += width + 1;
            widths.push(Constraint::Length(width));
            columns.push((name.to_string(), Some(name) == index_name, texts));
        }

        let header_style = Style::default().fg(self.header_fg).bg(self.header_bg);
        let header = Row::new(columns.iter().map(|(name, is_index, _)| {
            let style = if *is_index {
                header_style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                header_style
            };
            Cell::from(Span::styled(name.clone(), style))
        }))
        .style(header_style);

        let rows = (0..visible.height()).map(|row| {
            Row::new(columns.iter().map(|(_, is_index, texts)| {
                let (text, style) = &texts[row];
                let style = if *is_index {
                    style.add_modifier(Modifier::BOLD)
                } else {
                    *style
                };
                Cell::from(Span::styled(text.to_string(), style))
            }))
        });

        StatefulWidget::render(
            Table::new(rows, widths)
                .column_spacing(1)
                .header(header)
                .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            area,
            buf,
            &mut state.table_state,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_skip_text_and_non_finite() {
        let df = df!(
            "NAME" => ["a", "b", "c"],
            "X" => [1.0, f64::NAN, 3.0],
            "Y" => [f64::INFINITY, 2.0, -1.0],
        )
        .unwrap();
        let ranges = column_ranges(&df);
        assert_eq!(ranges[0], None);
        assert_eq!(ranges[1], Some(ColumnRange { min: 1.0, max: 3.0 }));
        assert_eq!(ranges[2], Some(ColumnRange { min: -1.0, max: 2.0 }));
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(1.0e-9), "1.000000e-9");
    }

    #[test]
    fn index_column_is_rendered_first() {
        let view = FilteredView {
            data: df!("A" => [1i64, 5], "B" => [2i64, 9]).unwrap(),
            index: Some("B".to_string()),
            query: String::new(),
        };
        let ranges = column_ranges(&view.data);
        let to_color = |rgb: Rgb| Color::from(rgb);
        let table = DataTable::new(&view, &ranges, &to_color);
        assert_eq!(table.display_columns(0), vec![1, 0]);
        assert_eq!(table.display_columns(1), vec![1]);
    }
}
