//! Message types for the Elm-style architecture
//!
//! All state changes flow through these message types. Worker threads send
//! them over the viewer's channel; the presentation side sends its own
//! viewport changes through the same path.

use crate::query::{QueryOutcome, Request};

/// Viewport messages (what to show, and query results)
#[derive(Debug, Clone)]
pub enum ViewportMsg {
    /// The presentation wants this window
    Desired(Request),
    /// Query finished on the worker thread
    QueryCompleted(QueryOutcome),
    /// Recompute the current window
    Refresh,
}

/// Background indexer messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMsg {
    /// Scan is `bytes` into a file of `file_len` bytes
    Progress { rows: u64, bytes: u64, file_len: u64 },
    /// Every row has been counted
    Completed { rows: u64 },
    /// Scan stopped on an I/O error
    Failed(String),
    /// The file is now `file_len` bytes, so the finished scan is stale
    FileChanged { file_len: u64 },
}

/// Top-level message type
#[derive(Debug, Clone)]
pub enum Msg {
    Viewport(ViewportMsg),
    Index(IndexMsg),
}

// Convenience constructors for common messages
impl Msg {
    pub fn desired(request: Request) -> Self {
        Msg::Viewport(ViewportMsg::Desired(request))
    }

    pub fn completed(outcome: QueryOutcome) -> Self {
        Msg::Viewport(ViewportMsg::QueryCompleted(outcome))
    }
}
