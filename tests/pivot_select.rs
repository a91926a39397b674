//! Sorted windows checked against an in-memory sort

mod common;

use brace::query::{Answer, ColumnSort, EngineSettings, Request};
use common::{engine_with, first_column, shuffled_csv};

const ROWS: usize = 3000;

fn settings(materialize_limit: usize, spill_fraction: f64) -> EngineSettings {
    EngineSettings {
        read_size: 512,
        materialize_limit,
        spill_fraction,
        ..EngineSettings::default()
    }
}

/// Row ids in sorted order, ties kept in file order
fn reference(keys: &[u64], by: impl Fn(usize) -> (u64, String)) -> Vec<String> {
    let mut rows: Vec<usize> = (0..keys.len()).collect();
    rows.sort_by_key(|&i| by(i));
    rows.into_iter().map(|i| i.to_string()).collect()
}

fn sorted(rank: u64, height: usize, order: Vec<ColumnSort>) -> Request {
    Request::at_rank(rank, height).with_sort(order)
}

#[test]
fn test_numeric_ascending_windows() {
    let (data, keys) = shuffled_csv(ROWS);
    let expected = reference(&keys, |i| (keys[i], String::new()));
    let mut engine = engine_with(&data, settings(64, 0.0));

    for rank in [0u64, 1, 700, 1500, 2990] {
        let answer = engine
            .query(sorted(rank, 10, vec![ColumnSort::ascending(1)]), Answer::default())
            .0
            .unwrap();
        let end = (rank as usize + 10).min(ROWS);
        assert_eq!(first_column(&answer), expected[rank as usize..end], "rank {}", rank);
        assert_eq!(answer.position, rank);
        assert_eq!(answer.total, ROWS as u64 + 1);
        assert!(answer.total_exact);
    }
}

#[test]
fn test_descending_with_spill() {
    let (data, keys) = shuffled_csv(ROWS);
    let expected = reference(&keys, |i| (ROWS as u64 - keys[i], String::new()));
    let mut engine = engine_with(&data, settings(32, 1.0));

    let answer = engine
        .query(sorted(1234, 20, vec![ColumnSort::descending(1)]), Answer::default())
        .0
        .unwrap();
    assert_eq!(first_column(&answer), expected[1234..1254]);
}

#[test]
fn test_ties_keep_file_order() {
    let (data, keys) = shuffled_csv(ROWS);
    // Column 2 is "label<key % 5>"
    let expected = reference(&keys, |i| (keys[i] % 5, String::new()));
    let mut engine = engine_with(&data, settings(50, 0.25));

    for rank in [0u64, 599, 600, 1800] {
        let answer = engine
            .query(sorted(rank, 8, vec![ColumnSort::ascending(2)]), Answer::default())
            .0
            .unwrap();
        assert_eq!(
            first_column(&answer),
            expected[rank as usize..rank as usize + 8],
            "rank {}",
            rank
        );
    }
}

#[test]
fn test_two_column_order() {
    let (data, keys) = shuffled_csv(ROWS);
    // label ascending, then key descending
    let expected = reference(&keys, |i| (keys[i] % 5, format!("{:08}", ROWS as u64 - keys[i])));
    let mut engine = engine_with(&data, settings(40, 0.0));
    let order = vec![ColumnSort::ascending(2), ColumnSort::descending(1)];

    let answer = engine
        .query(sorted(900, 12, order), Answer::default())
        .0
        .unwrap();
    assert_eq!(first_column(&answer), expected[900..912]);
}

#[test]
fn test_offset_applies_in_sorted_order() {
    let (data, keys) = shuffled_csv(ROWS);
    let expected = reference(&keys, |i| (keys[i], String::new()));
    let mut engine = engine_with(&data, settings(64, 0.0));

    let request = sorted(100, 5, vec![ColumnSort::ascending(1)]).with_offset(50);
    let answer = engine.query(request, Answer::default()).0.unwrap();
    assert_eq!(answer.position, 150);
    assert_eq!(first_column(&answer), expected[150..155]);
}

#[test]
fn test_pivots_are_cached_per_order() {
    let (data, _) = shuffled_csv(ROWS);
    let mut engine = engine_with(&data, settings(64, 0.0));
    let order = vec![ColumnSort::ascending(1)];

    engine
        .query(sorted(2000, 10, order.clone()), Answer::default())
        .0
        .unwrap();
    let pivots = engine.pivots(&order).unwrap();
    assert!(!pivots.is_empty());
    assert_eq!(pivots.total_rows(), Some(ROWS as u64));
    assert!(engine.pivots(&[ColumnSort::descending(1)]).is_none());

    // Neighbouring windows come out of the cached pivots unchanged
    let answer = engine
        .query(sorted(2010, 10, order), Answer::default())
        .0
        .unwrap();
    let keys: Vec<String> = (1..answer.height)
        .map(|r| answer.cell_str(r, 1).into_owned())
        .collect();
    let expected: Vec<String> = (2010..2020).map(|k: u64| k.to_string()).collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_sorted_window_past_end() {
    let (data, _) = shuffled_csv(100);
    let mut engine = engine_with(&data, settings(16, 0.0));
    let answer = engine
        .query(sorted(500, 10, vec![ColumnSort::ascending(1)]), Answer::default())
        .0
        .unwrap();
    assert_eq!(answer.height, 1);
    assert_eq!(answer.position, 100);
    assert_eq!(answer.total, 101);
    assert!(answer.total_exact);
}
