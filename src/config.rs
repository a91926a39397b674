//! Viewer configuration
//!
//! Stores user preferences in `~/.config/brace/config.yaml`. Every key is
//! optional; missing keys take their defaults.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::csv::{Dialect, READ_SIZE};
use crate::index::CHECKPOINT_STRIDE;
use crate::pivot::{MATERIALIZE_LIMIT, SPILL_FRACTION};
use crate::query::EngineSettings;

/// Bytes read from the start of a file to sniff its cell delimiter
const SNIFF_BYTES: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Cell delimiter; detected from the file when unset
    pub cell_delimiter: Option<char>,
    pub row_delimiter: char,
    pub read_size: usize,
    pub initial_answer_capacity: usize,
    pub max_answer_bytes: usize,
    pub checkpoint_stride: u64,
    /// Count rows on a background thread so totals become exact
    pub background_index: bool,
    pub index_progress_rows: u64,
    pub materialize_limit: usize,
    pub spill_fraction: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            cell_delimiter: None,
            row_delimiter: '\n',
            read_size: READ_SIZE,
            initial_answer_capacity: engine.initial_capacity,
            max_answer_bytes: engine.max_answer_bytes,
            checkpoint_stride: CHECKPOINT_STRIDE,
            background_index: true,
            index_progress_rows: 1 << 16,
            materialize_limit: MATERIALIZE_LIMIT,
            spill_fraction: SPILL_FRACTION,
        }
    }
}

/// Why a config file was rejected
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, message: String },
    /// Delimiters must be single ASCII characters
    Delimiter(char),
    SameDelimiters(char),
    /// A size or count that must be positive was zero
    Zero(&'static str),
    SpillFraction(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {}", path.display(), source),
            Self::Parse { path, message } => write!(f, "invalid {}: {}", path.display(), message),
            Self::Delimiter(c) => write!(f, "delimiter {:?} is not a single ASCII character", c),
            Self::SameDelimiters(c) => write!(f, "cell and row delimiter are both {:?}", c),
            Self::Zero(key) => write!(f, "{} must be greater than zero", key),
            Self::SpillFraction(v) => write!(f, "spill_fraction {} is outside 0.0..=1.0", v),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convert a delimiter character to its byte
pub fn delimiter_byte(c: char) -> Result<u8, ConfigError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ConfigError::Delimiter(c))
    }
}

impl ViewerConfig {
    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring config: {}", e);
                Self::default()
            }
        }
    }

    /// Load and validate a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let row = delimiter_byte(self.row_delimiter)?;
        if let Some(cell) = self.cell_delimiter {
            if delimiter_byte(cell)? == row {
                return Err(ConfigError::SameDelimiters(cell));
            }
        }
        for (key, value) in [
            ("read_size", self.read_size as u64),
            ("max_answer_bytes", self.max_answer_bytes as u64),
            ("checkpoint_stride", self.checkpoint_stride),
            ("index_progress_rows", self.index_progress_rows),
            ("materialize_limit", self.materialize_limit as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(key));
            }
        }
        if !(0.0..=1.0).contains(&self.spill_fraction) {
            return Err(ConfigError::SpillFraction(self.spill_fraction));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            read_size: self.read_size,
            initial_capacity: self.initial_answer_capacity,
            max_answer_bytes: self.max_answer_bytes,
            checkpoint_stride: self.checkpoint_stride,
            materialize_limit: self.materialize_limit,
            spill_fraction: self.spill_fraction,
        }
    }

    /// Delimiters for `path`
    ///
    /// A configured cell delimiter wins; otherwise the extension decides,
    /// and failing that the first lines of the file are sniffed.
    pub fn dialect_for(&self, path: &Path) -> io::Result<Dialect> {
        let invalid = |e: ConfigError| io::Error::new(io::ErrorKind::InvalidInput, e.to_string());
        let row = delimiter_byte(self.row_delimiter).map_err(invalid)?;
        if let Some(cell) = self.cell_delimiter {
            return Ok(Dialect::new(delimiter_byte(cell).map_err(invalid)?, row));
        }
        let mut sample = Vec::new();
        File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut sample)?;
        Ok(Dialect::for_file(path, &sample, row))
    }
}
