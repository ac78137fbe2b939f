//! Per-session state and the `evaluate` step that turns inputs into
//! everything the views draw.
//!
//! `evaluate` runs once per interaction. The loaded table is cached by upload
//! identity, so changing the query, the index or any display option never
//! re-parses the file; the filter result is memoised by
//! `(table generation, index, query)`.

use crate::chart_data::{self, DensityData, HistogramData, ScatterData};
use crate::error_display;
use crate::options::{ChartOptions, DisplayOptions};
use crate::profile::{self, ProfileReport};
use crate::query::{self, FilteredView, QueryError};
use crate::tfs::{Headers, TfsTable};
use crate::upload::{self, LoadError, UploadId, UploadedFile};
use std::path::PathBuf;
use tracing::{debug, info};

/// Parses an upload into a table. Called with no index; the session
/// designates the index afterwards.
pub trait Loader {
    fn load(&self, upload: &UploadedFile, index: Option<&str>) -> Result<TfsTable, LoadError>;
}

impl<F> Loader for F
where
    F: Fn(&UploadedFile, Option<&str>) -> Result<TfsTable, LoadError>,
{
    fn load(&self, upload: &UploadedFile, index: Option<&str>) -> Result<TfsTable, LoadError> {
        self(upload, index)
    }
}

/// Loads through a transient file in the system (or a given) temp directory.
#[derive(Debug, Clone, Default)]
pub struct TfsLoader {
    pub scratch_dir: Option<PathBuf>,
}

impl Loader for TfsLoader {
    fn load(&self, upload: &UploadedFile, index: Option<&str>) -> Result<TfsTable, LoadError> {
        let dir = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        upload::load_with_scratch(&upload.bytes, upload.compression, index, &dir)
    }
}

/// Limits that shape the presentation data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSettings {
    pub chart_row_limit: usize,
    pub density_grid: usize,
    pub sampling_threshold: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            chart_row_limit: 10_000,
            density_grid: 30,
            sampling_threshold: profile::SAMPLING_THRESHOLD,
        }
    }
}

/// Everything the user controls.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub upload: Option<UploadedFile>,
    /// Column to index by; empty keeps the file's own index (if any).
    pub index_column: String,
    pub query: String,
    pub display: DisplayOptions,
    pub charts: ChartOptions,
    pub generate_report: bool,
    pub settings: EvaluationSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Warning,
}

/// A message shown inline; never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

struct LoadedTable {
    table: TfsTable,
    /// Index the file itself designated (`INDEX&&&`), restored when the index input is cleared.
    natural_index: Option<String>,
}

struct FilterMemo {
    generation: u64,
    index: Option<String>,
    query: String,
    result: Result<FilteredView, QueryError>,
}

/// State carried between evaluations. Owned by one application instance.
#[derive(Default)]
pub struct SessionState {
    identity: Option<UploadId>,
    outcome: Option<Result<LoadedTable, LoadError>>,
    generation: u64,
    filter_memo: Option<FilterMemo>,
    load_count: usize,
    filter_count: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the loader has run.
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    /// How many times a query has been executed (memo misses).
    pub fn filter_count(&self) -> usize {
        self.filter_count
    }

    pub fn identity(&self) -> Option<UploadId> {
        self.identity
    }

    /// The cached table, if the current upload loaded successfully.
    pub fn table(&self) -> Option<&TfsTable> {
        match &self.outcome {
            Some(Ok(loaded)) => Some(&loaded.table),
            _ => None,
        }
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        match &self.outcome {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

/// What the views draw after one evaluation.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub upload_name: Option<String>,
    pub headers: Option<Headers>,
    /// Filtered rows; `None` when nothing is loaded.
    pub view: Option<FilteredView>,
    pub show_table: bool,
    /// Columns offered to chart forms (the index excluded).
    pub chart_columns: Vec<String>,
    pub scatter: Option<ScatterData>,
    pub histogram: Option<HistogramData>,
    pub density: Option<DensityData>,
    pub report: Option<ProfileReport>,
    pub notices: Vec<Notice>,
}

impl Evaluation {
    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(|n| n.level == NoticeLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Notice> {
        self.notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Warning)
    }
}

/// Run one evaluation. Returns the updated session and the presentation data.
pub fn evaluate(
    mut session: SessionState,
    inputs: &Inputs,
    loader: &dyn Loader,
) -> (SessionState, Evaluation) {
    let mut eval = Evaluation::default();
    let Some(upload) = inputs.upload.as_ref() else {
        return (session, eval);
    };
    eval.upload_name = Some(upload.name.clone());

    if session.identity != Some(upload.id) {
        info!(upload = %upload.id, name = %upload.name, bytes = upload.len(), "new upload");
        let outcome = loader.load(upload, None).map(|table| LoadedTable {
            natural_index: table.index().map(str::to_string),
            table,
        });
        session.load_count += 1;
        session.identity = Some(upload.id);
        session.outcome = Some(outcome);
        session.generation += 1;
        session.filter_memo = None;
    } else {
        debug!(upload = %upload.id, "reusing cached table");
    }

    let generation = session.generation;
    let loaded = match session.outcome.as_mut() {
        Some(Ok(loaded)) => loaded,
        Some(Err(e)) => {
            eval.notices
                .push(Notice::error(error_display::user_message_from_load(e, &upload.name)));
            return (session, eval);
        }
        None => return (session, eval),
    };

    let wanted = match inputs.index_column.trim() {
        "" => loaded.natural_index.clone(),
        column => Some(column.to_string()),
    };
    if wanted.as_deref() != loaded.table.index() {
        match loaded.table.set_index(wanted.as_deref()) {
            Ok(()) => debug!(index = ?wanted, "re-indexed cached table"),
            Err(e) => eval.notices.push(Notice::error(e.to_string())),
        }
    }
    let table = &loaded.table;

    let index = table.index().map(str::to_string);
    let query = inputs.query.trim();
    let memo_hit = session.filter_memo.as_ref().is_some_and(|m| {
        m.generation == generation && m.index == index && m.query == query
    });
    if !memo_hit {
        session.filter_count += 1;
        session.filter_memo = Some(FilterMemo {
            generation,
            index: index.clone(),
            query: query.to_string(),
            result: query::filter(table, query),
        });
    }
    let view = match session.filter_memo.as_ref().map(|m| &m.result) {
        Some(Ok(view)) => view.clone(),
        Some(Err(e)) => {
            eval.notices.push(Notice::error(e.to_string()));
            FilteredView::unfiltered(table)
        }
        None => FilteredView::unfiltered(table),
    };

    if inputs.display.show_headers {
        eval.headers = Some(table.headers.clone());
    }
    eval.show_table = inputs.display.show_table;
    eval.chart_columns = table.data_columns();
    present_charts(&mut eval, &view, inputs);

    if inputs.generate_report {
        match profile::profile(
            &view.data,
            view.index.as_deref(),
            inputs.settings.sampling_threshold,
        ) {
            Ok(report) => eval.report = Some(report),
            Err(e) => eval.notices.push(Notice::error(format!("report failed: {}", e))),
        }
    }

    eval.view = Some(view);
    (session, eval)
}

/// Names in `wanted` that `view` does not have.
fn unknown_columns<'a>(view: &FilteredView, wanted: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
    wanted
        .into_iter()
        .filter(|c| view.data.column(c).is_err())
        .map(String::as_str)
        .collect()
}

fn skipped(chart: &str, unknown: &[&str]) -> Notice {
    Notice::warning(format!(
        "{} skipped: unknown column(s) {}",
        chart,
        unknown.join(", ")
    ))
}

fn present_charts(eval: &mut Evaluation, view: &FilteredView, inputs: &Inputs) {
    let settings = &inputs.settings;

    if let Some(opts) = &inputs.charts.scatter {
        let unknown = unknown_columns(
            view,
            opts.x.iter().chain(&opts.y).chain(&opts.err_x).chain(&opts.err_y),
        );
        if !unknown.is_empty() {
            eval.notices.push(skipped("scatter plot", &unknown));
        } else {
            match chart_data::prepare_scatter(&view.data, opts, settings.chart_row_limit) {
                Ok(data) => {
                    eval.notices
                        .extend(data.warnings.iter().map(|w| Notice::warning(w.clone())));
                    eval.scatter = Some(data);
                }
                Err(e) => eval.notices.push(Notice::error(format!("scatter plot: {}", e))),
            }
        }
    }

    if let Some(opts) = &inputs.charts.histogram {
        let unknown = unknown_columns(view, &opts.columns);
        if !unknown.is_empty() {
            eval.notices.push(skipped("histogram", &unknown));
        } else {
            match chart_data::prepare_histogram(&view.data, opts) {
                Ok(data) => eval.histogram = Some(data),
                Err(e) => eval.notices.push(Notice::error(format!("histogram: {}", e))),
            }
        }
    }

    if let Some(opts) = &inputs.charts.density {
        let unknown = unknown_columns(view, opts.x.iter().chain(&opts.y));
        if !unknown.is_empty() {
            eval.notices.push(skipped("density plot", &unknown));
        } else {
            match chart_data::prepare_density(&view.data, opts, settings.density_grid) {
                Ok(data) => eval.density = data,
                Err(e) => eval.notices.push(Notice::error(format!("density plot: {}", e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "@ TITLE %s \"x\"\n* A B\n$ %d %d\n1 2\n5 9\n";

    fn inputs(upload: &UploadedFile) -> Inputs {
        Inputs {
            upload: Some(upload.clone()),
            ..Default::default()
        }
    }

    #[test]
    fn nothing_uploaded_is_empty() {
        let (session, eval) = evaluate(SessionState::new(), &Inputs::default(), &TfsLoader::default());
        assert_eq!(session.load_count(), 0);
        assert!(eval.view.is_none());
        assert!(eval.notices.is_empty());
    }

    #[test]
    fn failed_load_is_cached() {
        let upload = UploadedFile::new("bad.tfs", b"garbage line".to_vec());
        let loader = TfsLoader::default();
        let (session, eval) = evaluate(SessionState::new(), &inputs(&upload), &loader);
        assert_eq!(eval.errors().count(), 1);
        let (session, eval) = evaluate(session, &inputs(&upload), &loader);
        assert_eq!(session.load_count(), 1);
        assert!(session.load_error().is_some());
        assert_eq!(eval.errors().count(), 1);
    }

    #[test]
    fn filter_is_memoised_per_query() {
        let upload = UploadedFile::new("a.tfs", SIMPLE.as_bytes().to_vec());
        let loader = TfsLoader::default();
        let mut inp = inputs(&upload);
        inp.query = "A > 2".into();
        let (session, _) = evaluate(SessionState::new(), &inp, &loader);
        let (session, eval) = evaluate(session, &inp, &loader);
        assert_eq!(session.filter_count(), 1);
        assert_eq!(eval.view.unwrap().height(), 1);
        inp.query = "A > 0".into();
        let (session, eval) = evaluate(session, &inp, &loader);
        assert_eq!(session.filter_count(), 2);
        assert_eq!(eval.view.unwrap().height(), 2);
    }

    #[test]
    fn bad_query_shows_unfiltered_table() {
        let upload = UploadedFile::new("a.tfs", SIMPLE.as_bytes().to_vec());
        let mut inp = inputs(&upload);
        inp.query = "C > 1".into();
        let (_, eval) = evaluate(SessionState::new(), &inp, &TfsLoader::default());
        assert_eq!(eval.errors().count(), 1);
        assert_eq!(eval.view.unwrap().height(), 2);
    }

    #[test]
    fn index_error_keeps_previous_index() {
        let upload = UploadedFile::new("a.tfs", SIMPLE.as_bytes().to_vec());
        let loader = TfsLoader::default();
        let mut inp = inputs(&upload);
        inp.index_column = "A".into();
        let (session, _) = evaluate(SessionState::new(), &inp, &loader);
        inp.index_column = "NOPE".into();
        let (session, eval) = evaluate(session, &inp, &loader);
        assert_eq!(eval.errors().count(), 1);
        assert_eq!(session.table().unwrap().index(), Some("A"));
        assert_eq!(session.load_count(), 1);
        inp.index_column = String::new();
        let (session, eval) = evaluate(session, &inp, &loader);
        assert!(eval.notices.is_empty());
        assert_eq!(session.table().unwrap().index(), None);
    }
}
