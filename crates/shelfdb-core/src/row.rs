//! Schemas, stored rows and the records handed back to callers.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single cell: a value or the null marker
pub type Cell = Option<Value>;

/// Parses the textual form of a cell. `null` in any case is the null marker.
pub fn parse_cell(text: &str) -> Cell {
    if text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(Value::parse(text))
    }
}

/// Ordered, immutable list of column names.
///
/// The first column is the logical primary key. Uniqueness of its values is
/// assumed by the strategies that index on it, never enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Creates a schema, rejecting empty column lists and duplicate names
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(Error::InvalidSchema("no columns specified".to_string()));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.is_empty() {
                return Err(Error::InvalidSchema("empty column name".to_string()));
            }
            if !seen.insert(column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column '{}'",
                    column
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Column names in schema order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false: a schema has at least one column
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Name of the primary key column
    pub fn primary_key(&self) -> &str {
        &self.columns[0]
    }

    /// Position of a column, if it exists
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Position of a column, failing with [`Error::UnknownColumn`]
    pub fn require(&self, column: &str) -> Result<usize> {
        self.index_of(column)
            .ok_or_else(|| Error::UnknownColumn(column.to_string()))
    }

    /// Builds a row from one text value per column
    pub fn parse_row(&self, values: &[&str]) -> Result<Row> {
        if values.len() != self.columns.len() {
            return Err(Error::ColumnCountMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        Ok(Row {
            cells: values.iter().map(|v| parse_cell(v)).collect(),
        })
    }

    /// Renders a stored row as a caller-owned record
    pub fn record(&self, row: &Row) -> Record {
        let fields = self
            .columns
            .iter()
            .zip(&row.cells)
            .map(|(column, cell)| {
                let text = match cell {
                    Some(value) => value.to_string(),
                    None => "null".to_string(),
                };
                (column.clone(), text)
            })
            .collect();
        Record { fields }
    }
}

/// A stored row: one cell per schema column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// Creates a row from already typed cells
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// All cells in schema order
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Value at `column`, `None` for the null marker
    pub fn cell(&self, column: usize) -> Option<&Value> {
        self.cells.get(column).and_then(Option::as_ref)
    }

    /// Primary key value (first column)
    pub fn primary_key(&self) -> Option<&Value> {
        self.cell(0)
    }

    /// Replaces a cell and returns the previous one
    pub fn set(&mut self, column: usize, cell: Cell) -> Cell {
        std::mem::replace(&mut self.cells[column], cell)
    }
}

/// A row as returned to callers: ordered column to text pairs.
///
/// Records are copies. Mutating one never reaches back into a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Creates a record from column/text pairs
    pub fn new<I, C, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        }
    }

    /// Text of a column, if present
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrites a column's text, returning false if the column is absent
    pub fn set(&mut self, column: &str, value: impl Into<String>) -> bool {
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some((_, v)) => {
                *v = value.into();
                true
            }
            None => false,
        }
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    /// Cell texts in column order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    /// Column/text pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
