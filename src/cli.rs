//! Command-line argument parsing
//!
//! Supports:
//! - Printing one window of a file, in file order or sorted
//! - Counting rows with the indexer
//! - Writing synthetic test data

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ViewerConfig;
use crate::query::{Anchor, ColumnSort, Request};

/// Scroll through huge delimited files without loading them
#[derive(Parser, Debug)]
#[command(name = "brace", version, about = "Scroll through huge delimited files")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print one window of a file
    View(ViewArgs),
    /// Scan a file and report its row count
    Index(IndexArgs),
    /// Write synthetic log-style data for testing
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// File to view
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Start at data row N (zero-based, header excluded)
    #[arg(long, value_name = "N", conflicts_with = "byte")]
    pub row: Option<u64>,

    /// Start at the first row at or after byte N
    #[arg(long, value_name = "N")]
    pub byte: Option<u64>,

    /// Rows to skip past the start
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub offset: u64,

    /// Data rows to print
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub height: usize,

    /// Sort by a zero-based column, optionally `:desc` (repeatable)
    #[arg(long = "sort", value_name = "COL[:desc]", value_parser = parse_sort)]
    pub sort: Vec<ColumnSort>,

    /// Cell delimiter (detected when omitted)
    #[arg(short = 'd', long, value_name = "C")]
    pub delimiter: Option<char>,

    /// Print the window as JSON
    #[arg(long)]
    pub json: bool,

    /// Wait for the row count to be exact before printing
    #[arg(long)]
    pub wait_index: bool,

    /// Seconds to wait for results
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// File to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Cell delimiter (detected when omitted)
    #[arg(short = 'd', long, value_name = "C")]
    pub delimiter: Option<char>,

    /// Print every checkpoint, not just the summary
    #[arg(long)]
    pub checkpoints: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Output file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Data rows to write
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub rows: u64,

    /// Random seed; the same seed writes the same file
    #[arg(long, value_name = "S", default_value_t = 0)]
    pub seed: u64,
}

/// Parse `COL`, `COL:asc` or `COL:desc`
pub fn parse_sort(s: &str) -> Result<ColumnSort, String> {
    let (column, direction) = match s.split_once(':') {
        Some((column, direction)) => (column, Some(direction)),
        None => (s, None),
    };
    let column: usize = column
        .trim()
        .parse()
        .map_err(|_| format!("invalid column index '{}'", column))?;
    match direction.map(|d| d.trim().to_ascii_lowercase()).as_deref() {
        None | Some("asc") => Ok(ColumnSort::ascending(column)),
        Some("desc") => Ok(ColumnSort::descending(column)),
        Some(other) => Err(format!("unknown sort direction '{}'", other)),
    }
}

impl ViewArgs {
    pub fn request(&self) -> Request {
        let anchor = match (self.row, self.byte) {
            (_, Some(byte)) => Anchor::Byte(byte),
            (Some(row), None) => Anchor::Rank(row),
            (None, None) => Anchor::Rank(0),
        };
        Request::new(anchor, self.height)
            .with_offset(self.offset)
            .with_sort(self.sort.clone())
    }

    /// Fold command-line overrides into the loaded config
    pub fn apply_to(&self, config: &mut ViewerConfig) {
        if let Some(delimiter) = self.delimiter {
            config.cell_delimiter = Some(delimiter);
        }
        if !self.wait_index && !self.sort.is_empty() {
            // Sorted windows count rows themselves
            config.background_index = false;
        }
    }
}
