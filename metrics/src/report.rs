//! CSV series reports: a header plus one row per date.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use crate::error::{MetricsError, Result};

/// A rectangular CSV table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReport {
    /// Column names.
    pub header: Vec<String>,
    /// Data rows, each as long as `header`.
    pub rows: Vec<Vec<String>>,
}

impl CsvReport {
    /// Creates an empty report with the given columns.
    pub fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row of displayable cells.
    pub fn push<I, D>(&mut self, row: I)
    where
        I: IntoIterator<Item = D>,
        D: Display,
    {
        self.rows.push(row.into_iter().map(|cell| cell.to_string()).collect());
    }

    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders the report, `,`-separated and `\n`-terminated.
    ///
    /// Cells containing a comma, quote or line break are quoted, with inner
    /// quotes doubled.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(&self.rows) {
            for (i, cell) in line.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_cell(&mut out, cell);
            }
            out.push('\n');
        }
        out
    }

    /// Writes the rendered report to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Io`] if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).map_err(MetricsError::io(path))
    }
}

fn push_cell(out: &mut String, cell: &str) {
    if cell.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}
