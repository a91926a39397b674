//! Printable snapshots of an answer

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::query::Answer;

/// Owned copy of one window, for printing or JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewReport {
    pub width: usize,
    /// Data rows above the first printed row
    pub position: u64,
    /// Rows in the file, header included
    pub total: u64,
    pub total_exact: bool,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ViewReport {
    pub fn from_answer(answer: &Answer) -> Self {
        let row = |r: usize| -> Vec<String> {
            (0..answer.width)
                .map(|c| answer.cell_str(r, c).into_owned())
                .collect()
        };
        Self {
            width: answer.width,
            position: answer.position,
            total: answer.total,
            total_exact: answer.total_exact,
            header: if answer.height > 0 { row(0) } else { Vec::new() },
            rows: (1..answer.height).map(row).collect(),
        }
    }

    /// Boxed table with a leading row-number column, then a footer line
    pub fn render_table(&self) -> String {
        let last_row = self.position + self.rows.len() as u64;
        let total = if self.total_exact {
            format!("{}", self.total.saturating_sub(1))
        } else {
            format!("~{}", self.total.saturating_sub(1))
        };
        let footer = format!(
            "rows {}-{} of {}",
            self.position,
            last_row.saturating_sub(1).max(self.position),
            total
        );
        if self.header.is_empty() {
            return format!("{}\n", footer);
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        let header = std::iter::once(Cell::new("#"))
            .chain(self.header.iter().map(Cell::new));
        table.set_header(header);
        for (i, row) in self.rows.iter().enumerate() {
            let number = Cell::new(self.position + i as u64).set_alignment(CellAlignment::Right);
            table.add_row(std::iter::once(number).chain(row.iter().map(Cell::new)));
        }
        format!("{}\n{}\n", table, footer)
    }
}
