//! Query failures

use std::io;

/// Why a query produced no answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Open, seek or read failed
    Io { kind: io::ErrorKind, message: String },
    /// The character buffer could not grow to `requested` bytes
    CapacityExhausted { requested: usize },
    /// The query worker is no longer running
    Shutdown,
}

impl QueryError {
    /// Get a user-friendly error message
    pub fn user_message(&self, filename: &str) -> String {
        match self {
            Self::Io { message, .. } => format!("Error reading {}: {}", filename, message),
            Self::CapacityExhausted { requested } => format!(
                "Viewport of {} needs more than {} bytes of memory",
                filename, requested
            ),
            Self::Shutdown => format!("Viewer for {} has shut down", filename),
        }
    }
}

impl From<io::Error> for QueryError {
    fn from(e: io::Error) -> Self {
        Self::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { message, .. } => write!(f, "I/O error: {}", message),
            Self::CapacityExhausted { requested } => {
                write!(f, "cannot grow answer buffer to {} bytes", requested)
            }
            Self::Shutdown => write!(f, "query worker shut down"),
        }
    }
}

impl std::error::Error for QueryError {}
