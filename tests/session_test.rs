mod common;

use common::{simple_upload, twiss_upload, CountingLoader};
use tfsview::options::{HistogramOptions, ScatterOptions};
use tfsview::tfs::HeaderValue;
use tfsview::{evaluate, Inputs, SessionState};

fn inputs_for(upload: &tfsview::UploadedFile) -> Inputs {
    Inputs {
        upload: Some(upload.clone()),
        ..Default::default()
    }
}

#[test]
fn same_upload_is_loaded_once() {
    let loader = CountingLoader::new();
    let upload = twiss_upload();
    let mut inputs = inputs_for(&upload);

    let (session, _) = evaluate(SessionState::new(), &inputs, &loader);
    inputs.query = "BETX > 20".into();
    let (session, _) = evaluate(session, &inputs, &loader);
    inputs.display.show_headers = true;
    let (session, eval) = evaluate(session, &inputs, &loader);

    assert_eq!(loader.calls(), 1);
    assert_eq!(session.load_count(), 1);
    assert_eq!(eval.view.unwrap().height(), 2);
}

#[test]
fn new_identity_loads_again() {
    let loader = CountingLoader::new();
    let upload = twiss_upload();
    let (session, _) = evaluate(SessionState::new(), &inputs_for(&upload), &loader);
    let again = upload.reopened();
    assert_ne!(again.id, upload.id);
    let (session, _) = evaluate(session, &inputs_for(&again), &loader);
    assert_eq!(loader.calls(), 2);
    assert_eq!(session.identity(), Some(again.id));
}

#[test]
fn walkthrough_filter_and_headers() {
    let loader = CountingLoader::new();
    let mut inputs = inputs_for(&simple_upload());
    inputs.query = "A > 2".into();
    inputs.display.show_headers = true;

    let (_, eval) = evaluate(SessionState::new(), &inputs, &loader);
    assert!(eval.notices.is_empty());
    let headers = eval.headers.unwrap();
    assert_eq!(headers.get("TITLE"), Some(&HeaderValue::Str("x".into())));
    let view = eval.view.unwrap();
    assert_eq!(view.height(), 1);
    let b = view.data.column("B").unwrap().i64().unwrap().get(0);
    assert_eq!(b, Some(9));
}

#[test]
fn headers_are_hidden_unless_requested() {
    let (_, eval) = evaluate(
        SessionState::new(),
        &inputs_for(&simple_upload()),
        &CountingLoader::new(),
    );
    assert!(eval.headers.is_none());
    assert!(eval.show_table);
}

#[test]
fn index_column_is_not_offered_for_charts() {
    let mut inputs = inputs_for(&simple_upload());
    inputs.index_column = "A".into();
    let (session, eval) = evaluate(SessionState::new(), &inputs, &CountingLoader::new());
    assert_eq!(eval.chart_columns, vec!["B".to_string()]);
    assert_eq!(session.table().unwrap().index(), Some("A"));
    assert_eq!(eval.view.unwrap().index.as_deref(), Some("A"));
}

#[test]
fn empty_query_shows_the_whole_table() {
    let loader = CountingLoader::new();
    let mut inputs = inputs_for(&twiss_upload());
    inputs.query = "   ".into();
    let (session, eval) = evaluate(SessionState::new(), &inputs, &loader);
    let view = eval.view.unwrap();
    assert!(view.data.equals(&session.table().unwrap().data));
}

#[test]
fn unknown_query_column_is_reported() {
    let mut inputs = inputs_for(&twiss_upload());
    inputs.query = "BETZ > 1".into();
    let (_, eval) = evaluate(SessionState::new(), &inputs, &CountingLoader::new());
    let errors: Vec<_> = eval.errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("BETZ"));
    assert_eq!(eval.view.unwrap().height(), 4);
}

#[test]
fn charts_follow_the_filtered_rows() {
    let mut inputs = inputs_for(&twiss_upload());
    inputs.query = "BETX < 100".into();
    inputs.charts.scatter = Some(ScatterOptions {
        x: Some("S".into()),
        y: vec!["BETX".into(), "BETY".into()],
        ..Default::default()
    });
    inputs.charts.histogram = Some(HistogramOptions {
        columns: vec!["BETY".into()],
        ..Default::default()
    });
    let (_, eval) = evaluate(SessionState::new(), &inputs, &CountingLoader::new());
    let scatter = eval.scatter.unwrap();
    assert_eq!(scatter.series.len(), 2);
    assert!(scatter.series.iter().all(|s| s.points.len() == 3));
    let histogram = eval.histogram.unwrap();
    let total: f64 = histogram.series[0].bins.iter().map(|b| b.value).sum();
    assert_eq!(total, 3.0);
}

#[test]
fn unknown_chart_column_skips_only_that_chart() {
    let mut inputs = inputs_for(&twiss_upload());
    inputs.charts.scatter = Some(ScatterOptions {
        x: Some("S".into()),
        y: vec!["MUX".into()],
        ..Default::default()
    });
    inputs.charts.histogram = Some(HistogramOptions {
        columns: vec!["BETX".into()],
        ..Default::default()
    });
    let (_, eval) = evaluate(SessionState::new(), &inputs, &CountingLoader::new());
    assert!(eval.scatter.is_none());
    assert!(eval.histogram.is_some());
    assert_eq!(eval.warnings().count(), 1);
}

#[test]
fn report_is_built_from_the_filtered_view() {
    let mut inputs = inputs_for(&twiss_upload());
    inputs.query = "S >= 12.5".into();
    inputs.generate_report = true;
    let (_, eval) = evaluate(SessionState::new(), &inputs, &CountingLoader::new());
    let report = eval.report.unwrap();
    assert_eq!(report.overview.rows, 3);
    assert_eq!(report.overview.columns, 4);
    assert!(report.variable("BETY").unwrap().numeric.is_some());
}

#[test]
fn runaway_query_nesting_is_an_error_notice() {
    let loader = CountingLoader::new();
    for query in [
        format!("{}A > 2", "not ".repeat(1_000)),
        format!("{}A > 2{}", "(".repeat(3_000), ")".repeat(3_000)),
    ] {
        let mut inputs = inputs_for(&simple_upload());
        inputs.query = query;
        let (_, eval) = evaluate(SessionState::new(), &inputs, &loader);
        let errors: Vec<_> = eval.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("nested too deeply"));
        assert_eq!(eval.view.unwrap().height(), 2);
    }
}
