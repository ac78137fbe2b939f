use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, StatefulWidget, Tabs};

pub mod cache;
pub mod chart_data;
pub mod chart_export;
pub mod chart_forms;
pub mod colormap;
pub mod config;
pub mod error_display;
pub mod logging;
pub mod options;
pub mod profile;
pub mod query;
pub mod session;
pub mod tfs;
pub mod upload;
pub mod widgets;

pub use cache::{CacheManager, QueryHistory};
pub use config::{AppConfig, ColorParser, ConfigManager, Theme};
pub use session::{evaluate, Evaluation, Inputs, Loader, SessionState, TfsLoader};
pub use tfsview_cli::{Args, CompressionFormat};
pub use upload::UploadedFile;

use chart_export::{ChartExportFormat, ExportChart};
use chart_forms::{ChartForms, ChartKind, FormEvent};
use options::{BinCount, FigureHeight, TableColormap};
use profile::ProfileReport;
use session::{EvaluationSettings, NoticeLevel};
use widgets::chart::{render_chart_view, ChartContent};
use widgets::controls::Controls;
use widgets::datatable::{column_ranges, ColumnRange, DataTable, DataTableState};
use widgets::headers::HeadersTable;
use widgets::report::{report_lines, ReportView};
use widgets::text_input::{TextInput, TextInputEvent};

/// Application name used for cache directory and other app-specific paths
pub const APP_NAME: &str = "tfsview";

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Open(PathBuf),
    Upload(UploadedFile),
    /// Same file under a new identity, forcing a fresh load.
    Reopen,
    Evaluate,
    Export(PathBuf),
    Exit,
    Crash(String),
    Resize(u16, u16), // resized (width, height)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Data,
    Scatter,
    Histogram,
    Density,
    Report,
    Notices,
}

impl View {
    pub const ALL: [View; 6] = [
        View::Data,
        View::Scatter,
        View::Histogram,
        View::Density,
        View::Report,
        View::Notices,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Data => "Data",
            View::Scatter => "Scatter",
            View::Histogram => "Histogram",
            View::Density => "Density",
            View::Report => "Report",
            View::Notices => "Notices",
        }
    }

    pub fn chart_kind(self) -> Option<ChartKind> {
        match self {
            View::Scatter => Some(ChartKind::Scatter),
            View::Histogram => Some(ChartKind::Histogram),
            View::Density => Some(ChartKind::Density),
            _ => None,
        }
    }

    fn position(self) -> usize {
        View::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        View::ALL[(self.position() + 1) % View::ALL.len()]
    }

    fn prev(self) -> Self {
        View::ALL[(self.position() + View::ALL.len() - 1) % View::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    OpenPath,
    Index,
    Query,
    ExportPath,
}

impl InputField {
    fn title(self) -> &'static str {
        match self {
            InputField::OpenPath => " Open file ",
            InputField::Index => " Index column (empty: file index) ",
            InputField::Query => " Query (↑↓ history) ",
            InputField::ExportPath => " Export chart to (.png or .svg) ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Editing(InputField),
    Form(ChartKind),
}

#[derive(Default)]
pub struct ErrorModal {
    pub active: bool,
    pub message: String,
}

impl ErrorModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, message: String) {
        self.active = true;
        self.message = message;
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.message.clear();
    }
}

#[derive(Debug, Default)]
struct DebugState {
    enabled: bool,
    num_events: usize,
    num_frames: usize,
}

/// Profiling report kept across evaluations, with the query it describes.
struct GeneratedReport {
    query: String,
    lines: Vec<Line<'static>>,
}

/// Build the startup inputs from the command line and the configuration.
pub fn initial_inputs(args: &Args, config: &AppConfig) -> Result<Inputs> {
    let colormap_name = args
        .colormap
        .as_deref()
        .unwrap_or(config.display.table_colormap.as_str());
    let table_colormap: TableColormap = colormap_name.parse()?;
    let mut inputs = Inputs {
        index_column: args.index.clone().unwrap_or_default(),
        query: args.query.clone().unwrap_or_default(),
        settings: EvaluationSettings {
            chart_row_limit: config.charts.row_limit,
            density_grid: config.charts.density_grid,
            sampling_threshold: args
                .sampling_threshold
                .unwrap_or(config.performance.sampling_threshold),
        },
        ..Default::default()
    };
    inputs.display.show_headers = config.display.show_headers;
    inputs.display.show_table = config.display.show_table;
    inputs.display.table_colormap = table_colormap;
    Ok(inputs)
}

pub struct App {
    events: Sender<AppEvent>,
    /// Taken out for the duration of `evaluate`.
    session: Option<SessionState>,
    pub inputs: Inputs,
    pub evaluation: Evaluation,
    loader: Box<dyn Loader>,
    pub view: View,
    pub input_mode: InputMode,
    text_input: TextInput,
    history: QueryHistory,
    pub forms: ChartForms,
    table_state: DataTableState,
    ranges: Vec<Option<ColumnRange>>,
    report: Option<GeneratedReport>,
    report_scroll: u16,
    theme: Theme,
    colors: ColorParser,
    config: AppConfig,
    status: Option<String>,
    error_modal: ErrorModal,
    show_help: bool,
    help_scroll: usize,
    debug: DebugState,
}

impl App {
    pub fn send_event(&mut self, event: AppEvent) -> Result<()> {
        self.events.send(event)?;
        Ok(())
    }

    pub fn new(events: Sender<AppEvent>) -> App {
        let config = AppConfig::default();
        let theme = Theme::from_config(&config.theme).unwrap_or_else(|e| {
            warn!("failed to create default theme: {}", e);
            Theme {
                colors: std::collections::HashMap::new(),
            }
        });
        Self::new_with_config(events, theme, config)
    }

    pub fn new_with_config(events: Sender<AppEvent>, theme: Theme, app_config: AppConfig) -> App {
        let history = if app_config.query.enable_history {
            match CacheManager::new(APP_NAME) {
                Ok(cache) => QueryHistory::load(&cache, app_config.query.history_limit),
                Err(e) => {
                    warn!("could not initialize cache manager: {}", e);
                    QueryHistory::in_memory(app_config.query.history_limit)
                }
            }
        } else {
            QueryHistory::in_memory(app_config.query.history_limit)
        };
        let forms = ChartForms::new(
            BinCount::clamped(app_config.charts.default_bins),
            FigureHeight::clamped(app_config.charts.default_height),
        );
        let text_input = TextInput::new().with_text_color(theme.get("text_primary"));
        App {
            events,
            session: Some(SessionState::new()),
            inputs: Inputs::default(),
            evaluation: Evaluation::default(),
            loader: Box::new(TfsLoader::default()),
            view: View::Data,
            input_mode: InputMode::Normal,
            text_input,
            history,
            forms,
            table_state: DataTableState::default(),
            ranges: Vec::new(),
            report: None,
            report_scroll: 0,
            theme,
            colors: ColorParser::new(),
            config: app_config,
            status: None,
            error_modal: ErrorModal::new(),
            show_help: false,
            help_scroll: 0,
            debug: DebugState::default(),
        }
    }

    /// Replace the loader; the session cache is reset with it.
    pub fn with_loader(mut self, loader: Box<dyn Loader>) -> Self {
        self.loader = loader;
        self.session = Some(SessionState::new());
        self
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    fn color(&self, name: &str) -> Color {
        self.theme.get(name)
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Open(path) => {
                let upload = if path.as_os_str() == "-" {
                    UploadedFile::from_reader("stdin", std::io::stdin().lock())
                } else {
                    UploadedFile::from_path(path)
                };
                match upload {
                    Ok(upload) => Some(AppEvent::Upload(upload)),
                    Err(e) => {
                        self.error_modal.show(format!(
                            "Failed to open {}: {}",
                            path.display(),
                            error_display::user_message_from_io(&e, None)
                        ));
                        None
                    }
                }
            }
            AppEvent::Upload(upload) => {
                info!(name = %upload.name, "opened");
                self.inputs.upload = Some(upload.clone());
                self.table_state.reset();
                self.report = None;
                self.status = Some(format!("Opened {}", upload.name));
                Some(AppEvent::Evaluate)
            }
            AppEvent::Reopen => {
                let upload = self.inputs.upload.as_ref()?.reopened();
                self.status = Some(format!("Reloaded {}", upload.name));
                Some(AppEvent::Upload(upload))
            }
            AppEvent::Evaluate => {
                self.evaluate();
                None
            }
            AppEvent::Export(path) => {
                self.export(path);
                None
            }
            AppEvent::Resize(_, _) => None,
            AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    /// Re-run the evaluation with the current inputs.
    pub fn evaluate(&mut self) {
        let session = self.session.take().unwrap_or_default();
        let (session, evaluation) = session::evaluate(session, &self.inputs, self.loader.as_ref());
        self.session = Some(session);
        self.inputs.generate_report = false;

        self.ranges = evaluation
            .view
            .as_ref()
            .map(|v| column_ranges(&v.data))
            .unwrap_or_default();
        if let Some(view) = &evaluation.view {
            if self.table_state.start_row >= view.height() {
                self.table_state.start_row = view.height().saturating_sub(1);
            }
        }
        self.forms.set_columns(evaluation.chart_columns.clone());
        if let Some(report) = &evaluation.report {
            self.set_report(report);
        }
        for notice in &evaluation.notices {
            debug!(level = ?notice.level, "{}", notice.message);
        }
        self.evaluation = evaluation;
    }

    fn set_report(&mut self, report: &ProfileReport) {
        self.report = Some(GeneratedReport {
            query: self.inputs.query.clone(),
            lines: report_lines(report, self.color("primary")),
        });
        self.report_scroll = 0;
    }

    fn export(&mut self, path: &std::path::Path) {
        let Some(kind) = self.view.chart_kind() else {
            return;
        };
        let Some(format) = ChartExportFormat::from_path(path) else {
            self.error_modal
                .show("Export path must end in .png or .svg".to_string());
            return;
        };
        let charts = &self.inputs.charts;
        let (chart, height) = match kind {
            ChartKind::Scatter => (
                self.evaluation.scatter.as_ref().map(ExportChart::Scatter),
                charts.scatter.as_ref().map(|o| o.height),
            ),
            ChartKind::Histogram => (
                self.evaluation.histogram.as_ref().map(ExportChart::Histogram),
                charts.histogram.as_ref().map(|o| o.height),
            ),
            ChartKind::Density => (
                self.evaluation.density.as_ref().map(ExportChart::Density),
                charts.density.as_ref().map(|o| o.height),
            ),
        };
        let Some(chart) = chart else {
            self.error_modal
                .show(format!("No {} chart to export", kind.as_str()));
            return;
        };
        let size = (
            self.config.charts.export_width,
            height.unwrap_or_default().get(),
        );
        match chart_export::write_chart(path, format, chart, size) {
            Ok(()) => {
                info!(path = %path.display(), format = format.as_str(), "chart exported");
                self.status = Some(format!("Exported {}", path.display()));
            }
            Err(e) => self
                .error_modal
                .show(error_display::user_message_from_report(&e, Some(path))),
        }
    }

    fn start_editing(&mut self, field: InputField) {
        let value = match field {
            InputField::OpenPath => String::new(),
            InputField::Index => self.inputs.index_column.clone(),
            InputField::Query => self.inputs.query.clone(),
            InputField::ExportPath => {
                let stem = self
                    .inputs
                    .upload
                    .as_ref()
                    .map(|u| u.name.as_str())
                    .unwrap_or("chart");
                let kind = self.view.chart_kind().map_or("chart", ChartKind::as_str);
                chart_export::default_export_path(stem, kind, ChartExportFormat::Png)
                    .display()
                    .to_string()
            }
        };
        self.text_input.clear();
        self.text_input.set_value(value);
        self.text_input.set_focused(true);
        self.input_mode = InputMode::Editing(field);
    }

    fn submit_input(&mut self, field: InputField) -> Option<AppEvent> {
        let value = self.text_input.value().trim().to_string();
        self.text_input.set_focused(false);
        self.input_mode = InputMode::Normal;
        match field {
            InputField::OpenPath => {
                (!value.is_empty()).then(|| AppEvent::Open(PathBuf::from(value)))
            }
            InputField::Index => {
                self.inputs.index_column = value;
                self.table_state.reset();
                Some(AppEvent::Evaluate)
            }
            InputField::Query => {
                if self.config.query.enable_history && !value.is_empty() {
                    self.history.push(&value);
                }
                self.inputs.query = value;
                self.table_state.start_row = 0;
                Some(AppEvent::Evaluate)
            }
            InputField::ExportPath => {
                (!value.is_empty()).then(|| AppEvent::Export(PathBuf::from(value)))
            }
        }
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppEvent::Exit);
        }
        if self.error_modal.active {
            if matches!(event.code, KeyCode::Esc | KeyCode::Enter) {
                self.error_modal.hide();
            }
            return None;
        }
        if self.show_help {
            match event.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                    self.show_help = false;
                    self.help_scroll = 0;
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.help_scroll = self.help_scroll.saturating_add(1)
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.help_scroll = self.help_scroll.saturating_sub(1)
                }
                KeyCode::PageDown => self.help_scroll = self.help_scroll.saturating_add(10),
                KeyCode::PageUp => self.help_scroll = self.help_scroll.saturating_sub(10),
                KeyCode::Home => self.help_scroll = 0,
                _ => {}
            }
            return None;
        }

        match self.input_mode {
            InputMode::Editing(field) => {
                let history = (field == InputField::Query).then_some(&self.history);
                match self.text_input.handle_key(event, history) {
                    TextInputEvent::Submit => self.submit_input(field),
                    TextInputEvent::Cancel => {
                        self.text_input.set_focused(false);
                        self.input_mode = InputMode::Normal;
                        None
                    }
                    TextInputEvent::None | TextInputEvent::HistoryChanged => None,
                }
            }
            InputMode::Form(kind) => match self.forms.handle_key(kind, event) {
                FormEvent::Submit => {
                    self.forms.submit(kind, &mut self.inputs.charts);
                    self.input_mode = InputMode::Normal;
                    Some(AppEvent::Evaluate)
                }
                FormEvent::Cancel => {
                    self.forms.load(&self.inputs.charts);
                    self.input_mode = InputMode::Normal;
                    None
                }
                FormEvent::None => None,
            },
            InputMode::Normal => self.normal_key(event),
        }
    }

    fn normal_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let rows = self.evaluation.view.as_ref().map_or(0, |v| v.height());
        let page = self.table_state.visible_rows.max(1);
        match event.code {
            KeyCode::Char('q') => return Some(AppEvent::Exit),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('o') => self.start_editing(InputField::OpenPath),
            KeyCode::Char('R') => return Some(AppEvent::Reopen),
            KeyCode::Char('i') => self.start_editing(InputField::Index),
            KeyCode::Char('/') => self.start_editing(InputField::Query),
            KeyCode::Tab => self.view = self.view.next(),
            KeyCode::BackTab => self.view = self.view.prev(),
            KeyCode::Char(c @ '1'..='6') => {
                self.view = View::ALL[c as usize - '1' as usize];
            }
            KeyCode::Char('h') => {
                self.inputs.display.show_headers = !self.inputs.display.show_headers;
                return Some(AppEvent::Evaluate);
            }
            KeyCode::Char('t') => {
                self.inputs.display.show_table = !self.inputs.display.show_table;
                return Some(AppEvent::Evaluate);
            }
            KeyCode::Char('c') => {
                self.inputs.display.table_colormap = self.inputs.display.table_colormap.cycle();
            }
            KeyCode::Char('C') => {
                self.inputs.display.table_colormap =
                    self.inputs.display.table_colormap.cycle_back();
            }
            KeyCode::Char('p') => {
                if self.inputs.upload.is_some() {
                    self.inputs.generate_report = true;
                    self.view = View::Report;
                    return Some(AppEvent::Evaluate);
                }
            }
            KeyCode::Char('e') if self.view.chart_kind().is_some() => {
                self.start_editing(InputField::ExportPath)
            }
            KeyCode::Enter => {
                if let Some(kind) = self.view.chart_kind() {
                    self.forms.load(&self.inputs.charts);
                    self.forms.focus = 0;
                    self.forms.cursor = 0;
                    self.input_mode = InputMode::Form(kind);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => match self.view {
                View::Report => self.report_scroll = self.report_scroll.saturating_add(1),
                _ => self.table_state.scroll_down(1, rows),
            },
            KeyCode::Up | KeyCode::Char('k') => match self.view {
                View::Report => self.report_scroll = self.report_scroll.saturating_sub(1),
                _ => self.table_state.scroll_up(1),
            },
            KeyCode::PageDown => match self.view {
                View::Report => self.report_scroll = self.report_scroll.saturating_add(20),
                _ => self.table_state.scroll_down(page, rows),
            },
            KeyCode::PageUp => match self.view {
                View::Report => self.report_scroll = self.report_scroll.saturating_sub(20),
                _ => self.table_state.scroll_up(page),
            },
            KeyCode::Home | KeyCode::Char('g') => {
                self.table_state.start_row = 0;
                self.report_scroll = 0;
            }
            KeyCode::End | KeyCode::Char('G') => self.table_state.end(rows),
            KeyCode::Right | KeyCode::Char('l') => {
                let columns = self.evaluation.view.as_ref().map_or(0, |v| v.data.width());
                self.table_state.scroll_right(columns);
            }
            KeyCode::Left => self.table_state.scroll_left(),
            _ => {}
        }
        None
    }

    fn get_help_info(&self) -> (&'static str, &'static str) {
        match self.input_mode {
            InputMode::Editing(InputField::Query) => ("Query Help", "\
Query Syntax:
  Comparisons of columns, numbers and strings joined by and/or/not.
  Operators:  == != < <= > >=   + - * / %   and (&&)  or (||)  not (!)
  Functions:  abs(x)  isnull(x) / isna(x)  notnull(x) / notna(x)
  Quote column names with spaces in backticks: `my col`

Examples:
  BETX > 100 and S < 2500
  abs(DX) >= 0.1 or KEYWORD == \"MONITOR\"
  not isnull(K1L)

Keys:
  Enter:            Apply query (empty query shows every row)
  Up/Down:          Browse query history
  Esc:              Cancel"),
            InputMode::Form(_) => ("Chart Options Help", "\
Fields:
  Up/Down, Tab:     Move between fields
  Left/Right:       Move over columns, or change a value
  Space:            Select / deselect the highlighted column
  Backspace:        Clear the column field
  +/-:              Step bins and figure height

Submit:
  Enter:            Apply the options and redraw the chart
  Esc:              Discard changes"),
            _ => ("Main View Help", "\
Files:
  o:                Open a TFS file (path, or - for stdin)
  R:                Reload the current file

Data:
  /:                Query (filter rows)
  i:                Set the index column
  h:                Toggle headers
  t:                Toggle table
  c / C:            Cycle table colormap
  Arrows, j/k/l:    Scroll table
  PgUp/PgDown:      Scroll pages
  g / G:            Top / bottom

Views:
  Tab / Shift+Tab:  Next / previous view
  1-6:              Data, Scatter, Histogram, Density, Report, Notices
  Enter:            Edit chart options (chart views)
  e:                Export chart to PNG or SVG (chart views)
  p:                Generate the profiling report

Help Navigation:
  Arrow keys (↑↓):  Scroll help content
  PageUp/PageDown:  Scroll help pages

Exit:
  q / Ctrl+c:       Quit"),
        }
    }

    fn render_data_view(&mut self, area: Rect, buf: &mut Buffer) {
        let secondary = self.color("text_secondary");
        let Some(name) = self.evaluation.upload_name.clone() else {
            Paragraph::new("Press o to open a TFS file, ? for help")
                .style(Style::default().fg(secondary))
                .centered()
                .render(area, buf);
            return;
        };
        if self.evaluation.view.is_none() {
            let message = self
                .evaluation
                .errors()
                .next()
                .map(|n| n.message.clone())
                .unwrap_or_else(|| format!("{} could not be loaded", name));
            Paragraph::new(message)
                .style(Style::default().fg(self.color("error")))
                .wrap(ratatui::widgets::Wrap { trim: true })
                .render(area, buf);
            return;
        }

        let mut table_area = area;
        if let Some(headers) = &self.evaluation.headers {
            let wanted = headers.len() as u16 + 2;
            let max = if self.evaluation.show_table {
                area.height / 3
            } else {
                area.height
            };
            let split = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(wanted.min(max.max(3))), Constraint::Fill(1)])
                .split(area);
            HeadersTable::new(headers)
                .colors(self.color("controls_bg"), self.color("primary"))
                .render(split[0], buf);
            table_area = split[1];
        }

        if !self.evaluation.show_table {
            Paragraph::new("Table hidden (t to show)")
                .style(Style::default().fg(secondary))
                .centered()
                .render(table_area, buf);
            return;
        }
        let Some(view) = &self.evaluation.view else {
            return;
        };
        let colors = &self.colors;
        let to_terminal = |rgb: colormap::Rgb| colors.terminal_color(rgb);
        DataTable::new(view, &self.ranges, &to_terminal)
            .with_colormap(self.inputs.display.table_colormap.colormap())
            .with_colors(
                self.theme.get("table_header"),
                self.theme.get("controls_bg"),
                self.theme.get("null_value"),
            )
            .with_max_column_width(self.config.display.max_column_width)
            .render(table_area, buf, &mut self.table_state);
    }

    fn render_report_view(&self, area: Rect, buf: &mut Buffer) {
        match &self.report {
            Some(report) => {
                let stale = report.query != self.inputs.query;
                let border = if stale {
                    self.color("warning")
                } else {
                    self.color("modal_border")
                };
                ReportView::new(&report.lines, self.report_scroll, border).render(area, buf);
            }
            None => Paragraph::new("Press p to generate the profiling report")
                .style(Style::default().fg(self.color("text_secondary")))
                .centered()
                .render(area, buf),
        }
    }

    fn render_notices_view(&self, area: Rect, buf: &mut Buffer) {
        let items: Vec<ListItem> = self
            .evaluation
            .notices
            .iter()
            .map(|notice| {
                let (tag, color) = match notice.level {
                    NoticeLevel::Error => ("error  ", self.color("error")),
                    NoticeLevel::Warning => ("warning", self.color("warning")),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(tag, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                    Span::raw(" "),
                    Span::raw(notice.message.clone()),
                ]))
            })
            .collect();
        if items.is_empty() {
            Paragraph::new("No errors or warnings")
                .style(Style::default().fg(self.color("success")))
                .centered()
                .render(area, buf);
            return;
        }
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.color("modal_border")))
                .title(" Notices "),
        );
        Widget::render(list, area, buf);
    }

    fn status_line(&self) -> Line<'static> {
        let errors = self.evaluation.errors().count();
        let warnings = self.evaluation.warnings().count();
        let mut spans = Vec::new();
        if let Some(name) = &self.evaluation.upload_name {
            spans.push(Span::styled(
                format!(" {} ", name),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        if let Some(index) = self.evaluation.view.as_ref().and_then(|v| v.index.clone()) {
            spans.push(Span::raw(format!(" index: {} ", index)));
        }
        if !self.inputs.query.is_empty() {
            spans.push(Span::styled(
                format!(" query: {} ", self.inputs.query),
                Style::default().fg(Color::Cyan),
            ));
        }
        if self.inputs.display.table_colormap != TableColormap::None {
            spans.push(Span::raw(format!(
                " colormap: {} ",
                self.inputs.display.table_colormap
            )));
        }
        if errors > 0 {
            spans.push(Span::styled(
                format!(" {} error(s) ", errors),
                Style::default().fg(self.color("error")),
            ));
        }
        if warnings > 0 {
            spans.push(Span::styled(
                format!(" {} warning(s) ", warnings),
                Style::default().fg(self.color("warning")),
            ));
        }
        if let Some(status) = &self.status {
            spans.push(Span::styled(
                format!(" {} ", status),
                Style::default().fg(self.color("text_secondary")),
            ));
        }
        Line::from(spans)
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;

        let background_color = self.color("background");
        Block::default()
            .style(Style::default().bg(background_color))
            .render(area, buf);

        let mut constraints = vec![Constraint::Length(1), Constraint::Fill(1)];
        let editing = matches!(self.input_mode, InputMode::Editing(_));
        if editing {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Length(1)); // Status
        constraints.push(Constraint::Length(1)); // Controls
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        Tabs::new(
            View::ALL
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{} {}", i + 1, v.title())),
        )
        .select(self.view.position())
        .style(Style::default().fg(self.color("text_secondary")))
        .highlight_style(
            Style::default()
                .fg(self.color("primary"))
                .add_modifier(Modifier::BOLD),
        )
        .render(layout[0], buf);

        let main_area = layout[1];
        match self.view {
            View::Data => self.render_data_view(main_area, buf),
            View::Scatter | View::Histogram | View::Density => {
                let content = match self.view {
                    View::Scatter => ChartContent::Scatter(self.evaluation.scatter.as_ref()),
                    View::Histogram => {
                        ChartContent::Histogram(self.evaluation.histogram.as_ref())
                    }
                    _ => ChartContent::Density(self.evaluation.density.as_ref()),
                };
                let editing_form = matches!(self.input_mode, InputMode::Form(_));
                render_chart_view(
                    main_area,
                    buf,
                    &self.forms,
                    editing_form,
                    content,
                    &self.theme,
                    &self.colors,
                );
            }
            View::Report => self.render_report_view(main_area, buf),
            View::Notices => self.render_notices_view(main_area, buf),
        }

        let mut next = 2;
        if let InputMode::Editing(field) = self.input_mode {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.color("modal_border_active")))
                .title(field.title());
            let inner = block.inner(layout[next]);
            block.render(layout[next], buf);
            (&self.text_input).render(inner, buf);
            next += 1;
        }

        Paragraph::new(self.status_line())
            .style(Style::default().bg(self.color("controls_bg")))
            .render(layout[next], buf);
        next += 1;

        let row_count = self.evaluation.view.as_ref().map(|v| v.height());
        let total = self
            .session
            .as_ref()
            .and_then(|s| s.table())
            .map(|t| t.height());
        let mut controls = Controls::new()
            .with_dimmed(self.input_mode != InputMode::Normal)
            .with_query_active(!self.inputs.query.is_empty())
            .with_bg(self.color("controls_bg"));
        if let (Some(shown), Some(total)) = (row_count, total) {
            controls = controls.with_row_count(shown, total);
        }
        controls.render(layout[next], buf);
        next += 1;

        if self.debug.enabled {
            let (loads, filters) = self
                .session
                .as_ref()
                .map_or((0, 0), |s| (s.load_count(), s.filter_count()));
            Paragraph::new(format!(
                "loads: {}  filters: {}  events: {}  frames: {}",
                loads, filters, self.debug.num_events, self.debug.num_frames
            ))
            .style(Style::default().fg(self.color("dimmed")))
            .render(layout[next], buf);
        }

        if self.error_modal.active {
            let popup_area = centered_rect(area, 70, 40);
            Clear.render(popup_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .border_style(Style::default().fg(self.color("modal_border_error")));
            let inner_area = block.inner(popup_area);
            block.render(popup_area, buf);

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(3)])
                .split(inner_area);

            Paragraph::new(self.error_modal.message.as_str())
                .style(Style::default().fg(self.color("error")))
                .wrap(ratatui::widgets::Wrap { trim: true })
                .render(chunks[0], buf);

            let ok_style = Style::default().fg(self.color("modal_border_active"));
            Paragraph::new("[ OK ]")
                .centered()
                .block(Block::default().borders(Borders::ALL).border_style(ok_style))
                .render(chunks[1], buf);
        }

        if self.show_help {
            let popup_area = centered_rect(area, 60, 60);
            Clear.render(popup_area, buf);
            let (title, text) = self.get_help_info();
            Paragraph::new(text)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(title)
                        .border_style(Style::default().fg(self.color("modal_border_active"))),
                )
                .scroll((self.help_scroll as u16, 0))
                .render(popup_area, buf);
        }
    }
}

fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Render errors for the headless modes: print, report.
pub fn headless_error(evaluation: &Evaluation) -> Option<color_eyre::eyre::Report> {
    let messages: Vec<&str> = evaluation
        .errors()
        .map(|n| n.message.as_str())
        .collect();
    (!messages.is_empty()).then(|| eyre!(messages.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    const TWISS: &str = "\
@ TITLE %s \"x\"
* A B
$ %le %le
 1 2
 5 9
";

    fn app() -> App {
        let (tx, _rx) = channel();
        let mut config = AppConfig::default();
        config.query.enable_history = false;
        let theme = Theme::from_config(&config.theme).unwrap();
        App::new_with_config(tx, theme, config)
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn run(app: &mut App, event: AppEvent) {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            next = app.event(&event);
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            run(app, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn upload_then_query_filters_rows() {
        let mut app = app();
        run(&mut app, AppEvent::Upload(UploadedFile::new("t.tfs", TWISS.as_bytes())));
        assert_eq!(app.evaluation.view.as_ref().map(|v| v.height()), Some(2));

        run(&mut app, key(KeyCode::Char('/')));
        type_text(&mut app, "A > 2");
        run(&mut app, key(KeyCode::Enter));
        assert_eq!(app.inputs.query, "A > 2");
        assert_eq!(app.evaluation.view.as_ref().map(|v| v.height()), Some(1));
        assert_eq!(app.session().map(|s| s.load_count()), Some(1));
    }

    #[test]
    fn reopen_loads_again() {
        let mut app = app();
        run(&mut app, AppEvent::Upload(UploadedFile::new("t.tfs", TWISS.as_bytes())));
        run(&mut app, key(KeyCode::Char('R')));
        assert_eq!(app.session().map(|s| s.load_count()), Some(2));
    }

    #[test]
    fn views_cycle_with_tab_and_digits() {
        let mut app = app();
        run(&mut app, key(KeyCode::Tab));
        assert_eq!(app.view, View::Scatter);
        run(&mut app, key(KeyCode::Char('6')));
        assert_eq!(app.view, View::Notices);
        run(&mut app, key(KeyCode::Tab));
        assert_eq!(app.view, View::Data);
    }

    #[test]
    fn chart_form_submits_on_enter_only() {
        let mut app = app();
        run(&mut app, AppEvent::Upload(UploadedFile::new("t.tfs", TWISS.as_bytes())));
        run(&mut app, key(KeyCode::Char('3')));
        run(&mut app, key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Form(ChartKind::Histogram));
        run(&mut app, key(KeyCode::Char(' ')));
        assert!(app.inputs.charts.histogram.is_none());
        run(&mut app, key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Normal);
        let histogram = app.inputs.charts.histogram.as_ref().map(|h| h.columns.clone());
        assert_eq!(histogram, Some(vec!["A".to_string()]));
        assert!(app.evaluation.histogram.is_some());
    }

    #[test]
    fn renders_every_view() {
        let mut app = app();
        run(&mut app, AppEvent::Upload(UploadedFile::new("t.tfs", TWISS.as_bytes())));
        run(&mut app, key(KeyCode::Char('p')));
        assert!(app.report.is_some());
        let area = Rect::new(0, 0, 120, 40);
        for view in View::ALL {
            app.view = view;
            let mut buf = Buffer::empty(area);
            (&mut app).render(area, &mut buf);
        }
    }
}
