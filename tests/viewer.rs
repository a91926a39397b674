//! End-to-end tests through the threaded viewer

mod common;

use std::fs::OpenOptions;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use brace::config::ViewerConfig;
use brace::csv::Dialect;
use brace::query::{ColumnSort, EngineSettings, QueryError, Request};
use brace::runtime::{Viewer, Waker};
use common::{first_column, numbered_csv, shuffled_csv, temp_csv};

const TIMEOUT: Duration = Duration::from_secs(30);

fn config() -> ViewerConfig {
    ViewerConfig {
        index_progress_rows: 500,
        checkpoint_stride: 64,
        ..ViewerConfig::default()
    }
}

#[test]
fn test_view_then_exact_total() {
    let file = temp_csv(&numbered_csv(5000));
    let mut viewer = Viewer::open(file.path(), &config()).unwrap();
    viewer.submit_viewport(Request::at_rank(100, 10));

    let answer = viewer.settle(TIMEOUT).unwrap();
    let expected: Vec<String> = (100..110).map(|i: u32| i.to_string()).collect();
    assert_eq!(first_column(answer), expected);
    assert_eq!(answer.cell_str(0, 1), "value");

    assert!(viewer.wait_for_index(TIMEOUT));
    assert!(viewer.index_status().is_complete());
    let answer = viewer.answer().unwrap();
    assert!(answer.total_exact);
    assert_eq!(answer.total, 5001);
    assert_eq!(answer.position, 100);
}

#[test]
fn test_growth_rescans_background_index() {
    let file = temp_csv(&numbered_csv(200));
    let mut viewer = Viewer::open(file.path(), &config()).unwrap();
    viewer.submit_viewport(Request::at_rank(0, 5));
    assert!(viewer.wait_for_index(TIMEOUT));
    assert_eq!(viewer.answer().unwrap().total, 201);

    let mut append = OpenOptions::new().append(true).open(file.path()).unwrap();
    for i in 200..250 {
        writeln!(append, "{},v{}", i, i).unwrap();
    }
    append.flush().unwrap();

    viewer.submit_viewport(Request::at_rank(0, 6));
    viewer.settle(TIMEOUT).unwrap();
    assert!(!viewer.answer().unwrap().total_exact || viewer.answer().unwrap().total == 251);

    assert!(viewer.wait_for_index(TIMEOUT));
    assert_eq!(viewer.index().snapshot().total_rows(), Some(250));
    let answer = viewer.answer().unwrap();
    assert_eq!((answer.total, answer.total_exact), (251, true));
    assert_eq!(first_column(answer), ["0", "1", "2", "3", "4", "5"]);
}

#[test]
fn test_waker_runs_for_messages() {
    let file = temp_csv(&numbered_csv(100));
    let wakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wakes);
    let waker: Waker = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut viewer = Viewer::open_with_waker(file.path(), &config(), Some(waker)).unwrap();
    viewer.submit_viewport(Request::at_rank(0, 5));
    viewer.settle(TIMEOUT).unwrap();
    assert!(wakes.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_sorted_view_without_indexer() {
    let (data, keys) = shuffled_csv(1000);
    let file = temp_csv(&data);
    let config = ViewerConfig {
        background_index: false,
        materialize_limit: 64,
        ..config()
    };
    let mut viewer = Viewer::open(file.path(), &config).unwrap();
    assert!(!viewer.wait_for_index(Duration::from_millis(10)));

    viewer.submit_viewport(Request::at_rank(500, 4).with_sort(vec![ColumnSort::ascending(1)]));
    let answer = viewer.settle(TIMEOUT).unwrap();
    let expected: Vec<String> = (500..504)
        .map(|k| keys.iter().position(|&x| x == k).unwrap().to_string())
        .collect();
    assert_eq!(first_column(answer), expected);
    assert!(answer.total_exact);
    assert_eq!(answer.total, 1001);
}

#[test]
fn test_delimiter_from_extension() {
    let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
    std::io::Write::write_all(&mut file, b"a\tb\n1\t2\n").unwrap();
    let viewer = Viewer::open(file.path(), &config()).unwrap();
    assert_eq!(viewer.dialect().cell_delimiter, b'\t');
}

#[test]
fn test_stopped_worker_keeps_last_answer() {
    let mut viewer = Viewer::from_source(
        Cursor::new(numbered_csv(50).into_bytes()),
        Dialect::default(),
        EngineSettings::default(),
    )
    .unwrap();
    viewer.submit_viewport(Request::at_rank(5, 3));
    assert_eq!(viewer.settle(TIMEOUT).unwrap().position, 5);

    viewer.stop_worker();
    viewer.submit_viewport(Request::at_rank(20, 3));
    viewer.settle(TIMEOUT);
    assert_eq!(viewer.last_error(), Some(&QueryError::Shutdown));
    assert_eq!(viewer.answer().unwrap().position, 5);
    assert!(!viewer.model().controller.is_busy());
}

#[test]
fn test_refresh_recomputes_same_viewport() {
    let mut viewer = Viewer::from_source(
        Cursor::new(numbered_csv(50).into_bytes()),
        Dialect::default(),
        EngineSettings::default(),
    )
    .unwrap();
    let request = Request::at_rank(0, 3);
    viewer.submit_viewport(request.clone());
    viewer.settle(TIMEOUT);
    // Unchanged viewport is not requeried
    viewer.submit_viewport(request);
    viewer.settle(TIMEOUT);
    assert_eq!(viewer.model().controller.stats().dispatched, 1);

    viewer.refresh();
    viewer.settle(TIMEOUT);
    assert_eq!(viewer.model().controller.stats().dispatched, 2);
}
