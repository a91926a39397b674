//! Brace - windowed viewer for huge delimited files
//!
//! This crate answers viewport requests over files far larger than memory,
//! in file order or sorted, using the Elm Architecture pattern to keep the
//! presentation side responsive while queries run on background threads.

pub mod cli;
pub mod commands;
pub mod config;
pub mod config_paths;
pub mod controller;
pub mod csv;
pub mod generate;
pub mod index;
pub mod messages;
pub mod model;
pub mod pivot;
pub mod query;
pub mod report;
pub mod runtime;
pub mod tracing;
pub mod update;

// Re-export commonly used types
pub use commands::Cmd;
pub use config::ViewerConfig;
pub use controller::RequestController;
pub use messages::Msg;
pub use model::ViewerModel;
pub use query::{Anchor, Answer, ColumnSort, QueryEngine, QueryError, Request};
pub use runtime::Viewer;
