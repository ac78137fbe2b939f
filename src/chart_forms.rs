//! Chart form state: a draft of each chart's options, edited in the sidebar and
//! applied only when the form is submitted with Enter.

use crossterm::event::{KeyCode, KeyEvent};

use crate::options::{
    BinCount, ChartOptions, DensityOptions, FigureHeight, HistogramOptions, ScatterOptions,
};

/// Maximum number of columns selectable in a multi-column field.
pub const SERIES_MAX: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Scatter,
    Histogram,
    Density,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Density => "density",
        }
    }

    pub fn fields(self) -> &'static [Field] {
        match self {
            ChartKind::Scatter => &[
                Field::X,
                Field::Y,
                Field::ErrX,
                Field::ErrY,
                Field::Mode,
                Field::Height,
            ],
            ChartKind::Histogram => &[
                Field::Columns,
                Field::Marginal,
                Field::Normalization,
                Field::Bins,
                Field::Height,
            ],
            ChartKind::Density => &[
                Field::X,
                Field::Y,
                Field::Style,
                Field::Scale,
                Field::Direction,
                Field::Height,
            ],
        }
    }
}

/// A row of a chart form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    X,
    Y,
    ErrX,
    ErrY,
    Mode,
    Columns,
    Marginal,
    Normalization,
    Bins,
    Style,
    Scale,
    Direction,
    Height,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::X => "X",
            Field::Y => "Y",
            Field::ErrX => "X error",
            Field::ErrY => "Y error",
            Field::Mode => "Mode",
            Field::Columns => "Columns",
            Field::Marginal => "Marginal",
            Field::Normalization => "Normalization",
            Field::Bins => "Bins",
            Field::Style => "Contours",
            Field::Scale => "Colormap",
            Field::Direction => "Scale",
            Field::Height => "Height",
        }
    }

    pub fn is_column(self) -> bool {
        matches!(
            self,
            Field::X | Field::Y | Field::ErrX | Field::ErrY | Field::Columns
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    None,
    Submit,
    Cancel,
}

pub struct ChartForms {
    /// Columns offered in column fields.
    pub columns: Vec<String>,
    pub scatter: ScatterOptions,
    pub histogram: HistogramOptions,
    pub density: DensityOptions,
    pub focus: usize,
    /// Highlighted candidate in the focused column field.
    pub cursor: usize,
    defaults: (BinCount, FigureHeight),
}

impl ChartForms {
    pub fn new(bins: BinCount, height: FigureHeight) -> Self {
        let mut forms = Self {
            columns: Vec::new(),
            scatter: ScatterOptions::default(),
            histogram: HistogramOptions::default(),
            density: DensityOptions::default(),
            focus: 0,
            cursor: 0,
            defaults: (bins, height),
        };
        forms.load(&ChartOptions::default());
        forms
    }

    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
        self.cursor = self.cursor.min(self.columns.len().saturating_sub(1));
    }

    pub fn focused(&self, kind: ChartKind) -> Field {
        let fields = kind.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    /// Reset drafts to the submitted options (or to defaults for charts never submitted).
    pub fn load(&mut self, charts: &ChartOptions) {
        let (bins, height) = self.defaults;
        self.scatter = charts.scatter.clone().unwrap_or_else(|| ScatterOptions {
            height,
            ..Default::default()
        });
        self.histogram = charts.histogram.clone().unwrap_or_else(|| HistogramOptions {
            bins,
            height,
            ..Default::default()
        });
        self.density = charts.density.clone().unwrap_or_else(|| DensityOptions {
            height,
            ..Default::default()
        });
    }

    /// Copy the draft of `kind` into the submitted options.
    pub fn submit(&self, kind: ChartKind, charts: &mut ChartOptions) {
        match kind {
            ChartKind::Scatter => charts.scatter = Some(self.scatter.clone()),
            ChartKind::Histogram => charts.histogram = Some(self.histogram.clone()),
            ChartKind::Density => charts.density = Some(self.density.clone()),
        }
    }

    pub fn handle_key(&mut self, kind: ChartKind, event: &KeyEvent) -> FormEvent {
        let field = self.focused(kind);
        let fields = kind.fields().len();
        match event.code {
            KeyCode::Enter => return FormEvent::Submit,
            KeyCode::Esc => return FormEvent::Cancel,
            KeyCode::Up | KeyCode::BackTab => {
                self.focus = (self.focus + fields - 1) % fields;
                self.cursor = 0;
            }
            KeyCode::Down | KeyCode::Tab => {
                self.focus = (self.focus + 1) % fields;
                self.cursor = 0;
            }
            KeyCode::Left | KeyCode::Char('h') if field.is_column() => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') if field.is_column() => {
                self.cursor = (self.cursor + 1).min(self.columns.len().saturating_sub(1));
            }
            KeyCode::Char(' ') if field.is_column() => self.toggle(kind, field),
            KeyCode::Backspace | KeyCode::Delete if field.is_column() => self.clear(kind, field),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('-') => {
                self.adjust(kind, field, false)
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('+') | KeyCode::Char(' ') => {
                self.adjust(kind, field, true)
            }
            _ => {}
        }
        FormEvent::None
    }

    fn toggle(&mut self, kind: ChartKind, field: Field) {
        let Some(name) = self.columns.get(self.cursor).cloned() else {
            return;
        };
        let toggle_one = |slot: &mut Option<String>| {
            *slot = if slot.as_deref() == Some(name.as_str()) {
                None
            } else {
                Some(name.clone())
            };
        };
        let toggle_many = |list: &mut Vec<String>| {
            if let Some(pos) = list.iter().position(|c| *c == name) {
                list.remove(pos);
            } else if list.len() < SERIES_MAX {
                list.push(name.clone());
            }
        };
        match (kind, field) {
            (ChartKind::Scatter, Field::X) => toggle_one(&mut self.scatter.x),
            (ChartKind::Scatter, Field::Y) => toggle_many(&mut self.scatter.y),
            (ChartKind::Scatter, Field::ErrX) => toggle_many(&mut self.scatter.err_x),
            (ChartKind::Scatter, Field::ErrY) => toggle_many(&mut self.scatter.err_y),
            (ChartKind::Histogram, Field::Columns) => toggle_many(&mut self.histogram.columns),
            (ChartKind::Density, Field::X) => toggle_one(&mut self.density.x),
            (ChartKind::Density, Field::Y) => toggle_one(&mut self.density.y),
            _ => {}
        }
    }

    fn clear(&mut self, kind: ChartKind, field: Field) {
        match (kind, field) {
            (ChartKind::Scatter, Field::X) => self.scatter.x = None,
            (ChartKind::Scatter, Field::Y) => self.scatter.y.clear(),
            (ChartKind::Scatter, Field::ErrX) => self.scatter.err_x.clear(),
            (ChartKind::Scatter, Field::ErrY) => self.scatter.err_y.clear(),
            (ChartKind::Histogram, Field::Columns) => self.histogram.columns.clear(),
            (ChartKind::Density, Field::X) => self.density.x = None,
            (ChartKind::Density, Field::Y) => self.density.y = None,
            _ => {}
        }
    }

    fn adjust(&mut self, kind: ChartKind, field: Field, forward: bool) {
        macro_rules! step {
            ($value:expr) => {
                $value = if forward {
                    $value.cycle()
                } else {
                    $value.cycle_back()
                }
            };
        }
        macro_rules! bump {
            ($value:expr) => {
                $value = if forward {
                    $value.increment()
                } else {
                    $value.decrement()
                }
            };
        }
        match (kind, field) {
            (ChartKind::Scatter, Field::Mode) => step!(self.scatter.mode),
            (ChartKind::Scatter, Field::Height) => bump!(self.scatter.height),
            (ChartKind::Histogram, Field::Marginal) => step!(self.histogram.marginal),
            (ChartKind::Histogram, Field::Normalization) => step!(self.histogram.normalization),
            (ChartKind::Histogram, Field::Bins) => bump!(self.histogram.bins),
            (ChartKind::Histogram, Field::Height) => bump!(self.histogram.height),
            (ChartKind::Density, Field::Style) => step!(self.density.style),
            (ChartKind::Density, Field::Scale) => step!(self.density.scale),
            (ChartKind::Density, Field::Direction) => step!(self.density.direction),
            (ChartKind::Density, Field::Height) => bump!(self.density.height),
            _ => {}
        }
    }

    /// Columns currently chosen in a column field.
    pub fn selected(&self, kind: ChartKind, field: Field) -> Vec<&str> {
        fn one(v: &Option<String>) -> Vec<&str> {
            v.iter().map(String::as_str).collect()
        }
        fn many(v: &[String]) -> Vec<&str> {
            v.iter().map(String::as_str).collect()
        }
        match (kind, field) {
            (ChartKind::Scatter, Field::X) => one(&self.scatter.x),
            (ChartKind::Scatter, Field::Y) => many(&self.scatter.y),
            (ChartKind::Scatter, Field::ErrX) => many(&self.scatter.err_x),
            (ChartKind::Scatter, Field::ErrY) => many(&self.scatter.err_y),
            (ChartKind::Histogram, Field::Columns) => many(&self.histogram.columns),
            (ChartKind::Density, Field::X) => one(&self.density.x),
            (ChartKind::Density, Field::Y) => one(&self.density.y),
            _ => Vec::new(),
        }
    }

    /// Text shown for a field in the sidebar.
    pub fn value_text(&self, kind: ChartKind, field: Field) -> String {
        if field.is_column() {
            let selected = self.selected(kind, field);
            return if selected.is_empty() {
                "-".to_string()
            } else {
                selected.join(", ")
            };
        }
        match (kind, field) {
            (ChartKind::Scatter, Field::Mode) => self.scatter.mode.to_string(),
            (ChartKind::Scatter, Field::Height) => format!("{} px", self.scatter.height.get()),
            (ChartKind::Histogram, Field::Marginal) => self.histogram.marginal.to_string(),
            (ChartKind::Histogram, Field::Normalization) => {
                self.histogram.normalization.to_string()
            }
            (ChartKind::Histogram, Field::Bins) => self.histogram.bins.get().to_string(),
            (ChartKind::Histogram, Field::Height) => {
                format!("{} px", self.histogram.height.get())
            }
            (ChartKind::Density, Field::Style) => self.density.style.to_string(),
            (ChartKind::Density, Field::Scale) => self.density.scale.to_string(),
            (ChartKind::Density, Field::Direction) => self.density.direction.to_string(),
            (ChartKind::Density, Field::Height) => format!("{} px", self.density.height.get()),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Marginal, ScatterMode};
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn forms() -> ChartForms {
        let mut forms = ChartForms::new(BinCount::default(), FigureHeight::default());
        forms.set_columns(vec!["S".into(), "BETX".into(), "BETY".into()]);
        forms
    }

    #[test]
    fn drafts_apply_only_on_submit() {
        let mut forms = forms();
        let mut charts = ChartOptions::default();
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Char(' ')));
        assert_eq!(forms.scatter.x.as_deref(), Some("S"));
        assert!(charts.scatter.is_none());
        let event = forms.handle_key(ChartKind::Scatter, &key(KeyCode::Enter));
        assert_eq!(event, FormEvent::Submit);
        forms.submit(ChartKind::Scatter, &mut charts);
        assert_eq!(charts.scatter.unwrap().x.as_deref(), Some("S"));
    }

    #[test]
    fn cancel_restores_submitted() {
        let mut forms = forms();
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Char(' ')));
        forms.load(&ChartOptions::default());
        assert!(forms.scatter.x.is_none());
    }

    #[test]
    fn multi_select_toggles() {
        let mut forms = forms();
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Down));
        assert_eq!(forms.focused(ChartKind::Scatter), Field::Y);
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Right));
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Char(' ')));
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Right));
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Char(' ')));
        assert_eq!(forms.scatter.y, vec!["BETX", "BETY"]);
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Char(' ')));
        assert_eq!(forms.scatter.y, vec!["BETX"]);
    }

    #[test]
    fn choices_and_steppers_move_both_ways() {
        let mut forms = forms();
        // Mode
        forms.focus = 4;
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Right));
        assert_eq!(forms.scatter.mode, ScatterMode::Markers);
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Left));
        forms.handle_key(ChartKind::Scatter, &key(KeyCode::Left));
        assert_eq!(forms.scatter.mode, ScatterMode::LinesMarkers);

        forms.focus = 1;
        forms.handle_key(ChartKind::Histogram, &key(KeyCode::Right));
        assert_eq!(forms.histogram.marginal, Marginal::Violin);
        forms.focus = 3;
        forms.handle_key(ChartKind::Histogram, &key(KeyCode::Char('+')));
        assert_eq!(forms.histogram.bins.get(), BinCount::DEFAULT + BinCount::STEP);
    }

    #[test]
    fn value_text_lists_selection() {
        let mut forms = forms();
        assert_eq!(forms.value_text(ChartKind::Density, Field::X), "-");
        forms.density.x = Some("BETX".into());
        assert_eq!(forms.value_text(ChartKind::Density, Field::X), "BETX");
        assert_eq!(forms.value_text(ChartKind::Density, Field::Scale), "Default");
    }
}
