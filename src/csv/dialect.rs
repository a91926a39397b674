//! Delimiter configuration and detection

use std::path::Path;

/// The two single-byte separators of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dialect {
    pub cell_delimiter: u8,
    pub row_delimiter: u8,
}

impl Dialect {
    pub const fn new(cell_delimiter: u8, row_delimiter: u8) -> Self {
        Self {
            cell_delimiter,
            row_delimiter,
        }
    }

    pub fn with_cell_delimiter(self, cell_delimiter: u8) -> Self {
        Self {
            cell_delimiter,
            ..self
        }
    }

    /// Pick the cell delimiter for a file
    ///
    /// The extension wins when it names a known format, otherwise the
    /// content sample is sniffed.
    pub fn for_file(path: &Path, sample: &[u8], row_delimiter: u8) -> Self {
        let cell = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Delimiter::from_extension)
            .unwrap_or_else(|| detect_delimiter(sample, row_delimiter));
        Self::new(cell.byte(), row_delimiter)
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new(b',', b'\n')
    }
}

/// Well-known cell delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Pipe,
    Semicolon,
}

impl Delimiter {
    pub fn byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
            Delimiter::Pipe => b'|',
            Delimiter::Semicolon => b';',
        }
    }

    /// Delimiter implied by a file extension, if any
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Delimiter::Comma),
            "tsv" | "tab" => Some(Delimiter::Tab),
            "psv" => Some(Delimiter::Pipe),
            _ => None,
        }
    }
}

/// Detect delimiter by counting candidates in the first few rows
pub fn detect_delimiter(sample: &[u8], row_delimiter: u8) -> Delimiter {
    let head: Vec<u8> = sample
        .split(|&b| b == row_delimiter)
        .take(5)
        .flatten()
        .copied()
        .collect();

    let count = |d: Delimiter| head.iter().filter(|&&b| b == d.byte()).count();
    let comma_count = count(Delimiter::Comma);
    let tab_count = count(Delimiter::Tab);
    let pipe_count = count(Delimiter::Pipe);
    let semi_count = count(Delimiter::Semicolon);

    let max = comma_count.max(tab_count).max(pipe_count).max(semi_count);

    if max == 0 {
        return Delimiter::Comma;
    }

    if tab_count == max {
        Delimiter::Tab
    } else if pipe_count == max {
        Delimiter::Pipe
    } else if semi_count == max {
        Delimiter::Semicolon
    } else {
        Delimiter::Comma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter(b"a,b,c\n1,2,3\n", b'\n'), Delimiter::Comma);
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter(b"a\tb\tc\n1\t2\t3\n", b'\n'), Delimiter::Tab);
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter(b"a;b;c\n1;2;3\n", b'\n'), Delimiter::Semicolon);
    }

    #[test]
    fn test_detect_delimiter_empty_defaults_to_comma() {
        assert_eq!(detect_delimiter(b"", b'\n'), Delimiter::Comma);
    }

    #[test]
    fn test_extension_wins_over_content() {
        let dialect = Dialect::for_file(Path::new("data.tsv"), b"a,b,c\n", b'\n');
        assert_eq!(dialect.cell_delimiter, b'\t');
    }

    #[test]
    fn test_unknown_extension_sniffs() {
        let dialect = Dialect::for_file(Path::new("data.log"), b"a|b|c\n1|2|3\n", b'\n');
        assert_eq!(dialect.cell_delimiter, b'|');
        assert_eq!(dialect.row_delimiter, b'\n');
    }
}
