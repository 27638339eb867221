//! Tabular output.
//!
//! A [`TableBuilder`] accepts rows in append-only fashion; [`TableBuilder::finish`]
//! closes it into an immutable [`OutputTable`]. Missing metrics are
//! [`Cell::Absent`], never zero.

use std::fmt;

use serde::Serialize;

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Absent,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Absent, Cell::Number)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Absent => Ok(()),
        }
    }
}

/// Append-only row collector for one table.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    columns: Vec<String>,
    rows:    Vec<Vec<Cell>>,
}

impl TableBuilder {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Append a row. Short rows are padded with [`Cell::Absent`];
    /// rows wider than the header are a programming error.
    pub fn push(&mut self, mut row: Vec<Cell>) {
        assert!(
            row.len() <= self.columns.len(),
            "row has {} cells but the table has {} columns",
            row.len(),
            self.columns.len()
        );
        row.resize(self.columns.len(), Cell::Absent);
        self.rows.push(row);
    }

    /// Close the table.
    pub fn finish(self) -> OutputTable {
        OutputTable {
            columns: self.columns,
            rows:    self.rows,
        }
    }
}

/// A finalised, immutable table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputTable {
    columns: Vec<String>,
    rows:    Vec<Vec<Cell>>,
}

impl OutputTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` under column `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<&Cell> {
        let col = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Every cell of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[col]).collect())
    }
}
