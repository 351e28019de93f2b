//! BackwardsStack - LIFO row storage
//!
//! Rows are pushed onto a stack so the latest insert sits on top. Every
//! operation walks the stack from the top down without reordering it, so
//! lookups for recently inserted rows finish early in the scan and results
//! come back newest-first.

use crate::drain_positions;
use shelfdb_core::{parse_cell, Condition, Filter, Record, Result, Row, Schema, Table, TableKind};

/// LIFO table
#[derive(Debug)]
pub struct BackwardsStack {
    schema: Schema,
    /// Bottom of the stack at index 0, top at the end
    stack: Vec<Row>,
}

impl BackwardsStack {
    /// Creates an empty stack table
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            stack: Vec::new(),
        }
    }

    /// Most recently inserted live row
    pub fn peek(&self) -> Option<Record> {
        self.stack.last().map(|row| self.schema.record(row))
    }

    /// Stack positions of matching rows, top first
    fn matching(&self, filter: &Filter) -> Result<Vec<usize>> {
        let mut hits = Vec::new();
        for (pos, row) in self.stack.iter().enumerate().rev() {
            if filter.matches(row)? {
                hits.push(pos);
            }
        }
        Ok(hits)
    }
}

impl Table for BackwardsStack {
    fn kind(&self) -> TableKind {
        TableKind::BackwardsStack
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.stack.len()
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        self.stack.push(row);
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        Ok(hits
            .into_iter()
            .map(|pos| self.schema.record(&self.stack[pos]))
            .collect())
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &pos in &hits {
            self.stack[pos].set(column, cell.clone());
        }
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let mut hits = self.matching(&filter)?;
        hits.reverse();
        Ok(drain_positions(&mut self.stack, &hits).len())
    }
}
