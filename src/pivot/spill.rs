//! Temporary partition files
//!
//! Each record is `offset: u64 LE`, `len: u32 LE`, then the raw row bytes
//! without the row delimiter. The file is anonymous and removed by the OS
//! when the handle drops.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use crate::csv::{Dialect, RowRecord};

const HEADER_LEN: usize = 12;

pub struct SpillWriter {
    out: BufWriter<File>,
    dialect: Dialect,
    rows: u64,
}

impl SpillWriter {
    pub fn new(dialect: Dialect) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(tempfile::tempfile()?),
            dialect,
            rows: 0,
        })
    }

    pub fn push(&mut self, record: &RowRecord) -> io::Result<()> {
        let raw = record.raw(self.dialect);
        let len = u32::try_from(raw.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "row too long to spill"))?;
        self.out.write_all(&record.offset.to_le_bytes())?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(&raw)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and reopen for reading from the start
    pub fn finish(self) -> io::Result<SpillReader> {
        let mut file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        tracing::debug!("Spilled {} rows", self.rows);
        Ok(SpillReader {
            input: BufReader::new(file),
            dialect: self.dialect,
            rows: self.rows,
            raw: Vec::new(),
        })
    }
}

pub struct SpillReader {
    input: BufReader<File>,
    dialect: Dialect,
    rows: u64,
    raw: Vec<u8>,
}

impl SpillReader {
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.input.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Decode the next spilled row; `false` at end of file
    pub fn next_row(&mut self, record: &mut RowRecord) -> io::Result<bool> {
        let mut header = [0u8; HEADER_LEN];
        match self.input.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e),
        }
        let mut offset = [0u8; 8];
        let mut len = [0u8; 4];
        offset.copy_from_slice(&header[..8]);
        len.copy_from_slice(&header[8..]);
        let offset = u64::from_le_bytes(offset);
        let len = u32::from_le_bytes(len) as usize;
        self.raw.resize(len, 0);
        self.input.read_exact(&mut self.raw)?;
        *record = RowRecord::parse(offset, &self.raw, self.dialect);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spill_preserves_rows() {
        let dialect = Dialect::default();
        let mut writer = SpillWriter::new(dialect).unwrap();
        writer
            .push(&RowRecord::parse(40, b"b,,2", dialect))
            .unwrap();
        writer.push(&RowRecord::parse(7, b"a,x,1", dialect)).unwrap();
        let mut reader = writer.finish().unwrap();
        assert_eq!(reader.rows(), 2);

        for _ in 0..2 {
            let mut record = RowRecord::new();
            assert!(reader.next_row(&mut record).unwrap());
            assert_eq!(record.offset, 40);
            assert_eq!(record.len(), 3);
            assert_eq!(record.cell(1), Some(&b""[..]));
            assert!(reader.next_row(&mut record).unwrap());
            assert_eq!(record.offset, 7);
            assert_eq!(record.cell(2), Some(&b"1"[..]));
            assert!(!reader.next_row(&mut record).unwrap());
            reader.rewind().unwrap();
        }
    }
}
