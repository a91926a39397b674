//! Viewer state owned by the presentation thread

use crate::controller::RequestController;
use crate::query::Answer;

/// What the background indexer has reported so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IndexStatus {
    /// No background indexer, or it has not reported yet
    #[default]
    Pending,
    Scanning {
        rows: u64,
        bytes: u64,
        file_len: u64,
    },
    Complete {
        rows: u64,
    },
    Failed(String),
}

impl IndexStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, IndexStatus::Complete { .. })
    }

    /// Fraction of the file scanned, when scanning
    pub fn progress(&self) -> Option<f64> {
        match self {
            IndexStatus::Scanning { bytes, file_len, .. } if *file_len > 0 => {
                Some(*bytes as f64 / *file_len as f64)
            }
            IndexStatus::Complete { .. } => Some(1.0),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ViewerModel {
    pub controller: RequestController,
    pub index: IndexStatus,
}

impl ViewerModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self) -> Option<&Answer> {
        self.controller.answer()
    }
}
