//! Viewport queries: what is asked, what comes back, and the engine that
//! answers

mod answer;
mod engine;
mod error;
mod request;

pub use answer::Answer;
pub use engine::{EngineSettings, QueryEngine};
pub use error::QueryError;
pub use request::{Anchor, ColumnSort, Request};

/// A finished query travelling back from the worker
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// The request that was actually computed
    pub request: Request,
    pub result: Result<Answer, QueryError>,
}

impl QueryOutcome {
    pub fn new(request: Request, result: Result<Answer, QueryError>) -> Self {
        Self { request, result }
    }
}
