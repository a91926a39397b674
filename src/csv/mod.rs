//! Delimited-text decoding
//!
//! ```text
//! bytes ──► tokenizer::next_cell ──► RowReader ──► RowRecord
//!            (pure, no I/O)          (owns the source + read buffer)
//! ```
//!
//! The tokenizer is shared by every consumer: the query engine drives it
//! directly into an `Answer`, while the indexer and the pivot selector go
//! through `RowReader`.

mod dialect;
mod reader;
mod tokenizer;

pub use dialect::{detect_delimiter, Delimiter, Dialect};
pub use reader::{RowReader, RowRecord, READ_SIZE};
pub use tokenizer::{next_cell, ParseState, Signal};
