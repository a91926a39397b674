//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use brace::csv::Dialect;
use brace::query::{Answer, EngineSettings, QueryEngine};
use tempfile::NamedTempFile;

/// Settings small enough that every buffer boundary gets crossed
pub fn tiny_settings() -> EngineSettings {
    EngineSettings {
        read_size: 7,
        initial_capacity: 3,
        checkpoint_stride: 4,
        ..EngineSettings::default()
    }
}

pub fn engine(data: &str) -> QueryEngine<Cursor<Vec<u8>>> {
    engine_with(data, tiny_settings())
}

pub fn engine_with(data: &str, settings: EngineSettings) -> QueryEngine<Cursor<Vec<u8>>> {
    QueryEngine::new(
        Cursor::new(data.as_bytes().to_vec()),
        Dialect::default(),
        settings,
    )
}

/// `id,value` header plus `rows` rows where row `i` is `i,v<i>`
pub fn numbered_csv(rows: usize) -> String {
    let mut s = String::from("id,value\n");
    for i in 0..rows {
        s.push_str(&format!("{},v{}\n", i, i));
    }
    s
}

/// Rows whose second column is a fixed permutation of `0..rows`
pub fn shuffled_csv(rows: usize) -> (String, Vec<u64>) {
    // 7919 is prime, so i -> i * 7919 mod rows is a permutation when
    // rows is not a multiple of it
    let keys: Vec<u64> = (0..rows as u64).map(|i| (i * 7919) % rows as u64).collect();
    let mut s = String::from("row,key,label\n");
    for (i, key) in keys.iter().enumerate() {
        s.push_str(&format!("{},{},label{}\n", i, key, key % 5));
    }
    (s, keys)
}

pub fn temp_csv(data: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Every cell of the answer, row by row
pub fn cells(answer: &Answer) -> Vec<Vec<String>> {
    (0..answer.height)
        .map(|r| {
            (0..answer.width)
                .map(|c| answer.cell_str(r, c).into_owned())
                .collect()
        })
        .collect()
}

/// First column of each data row
pub fn first_column(answer: &Answer) -> Vec<String> {
    (1..answer.height)
        .map(|r| answer.cell_str(r, 0).into_owned())
        .collect()
}

/// A source that fails every read once `budget` bytes have been served
pub struct FailingSource {
    inner: Cursor<Vec<u8>>,
    budget: usize,
}

impl FailingSource {
    pub fn new(data: &str, budget: usize) -> Self {
        Self {
            inner: Cursor::new(data.as_bytes().to_vec()),
            budget,
        }
    }
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::other("disk went away"));
        }
        let len = buf.len().min(self.budget);
        let n = self.inner.read(&mut buf[..len])?;
        self.budget -= n;
        Ok(n)
    }
}

impl Seek for FailingSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
