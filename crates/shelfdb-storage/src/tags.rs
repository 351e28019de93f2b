//! Per-column tag counts.
//!
//! A full scan evaluates every predicate against every live row, so an
//! ordering predicate fails as soon as its column holds a non-null value of
//! another tag. Strategies that answer some lists from a key index keep
//! these counts so those lists fail exactly when a scan would.

use shelfdb_core::{Cell, Error, Filter, Operator, Result, Row, ValueKind};

const KINDS: [ValueKind; 3] = [ValueKind::Integer, ValueKind::Real, ValueKind::Text];

fn slot(kind: ValueKind) -> usize {
    match kind {
        ValueKind::Integer => 0,
        ValueKind::Real => 1,
        ValueKind::Text => 2,
    }
}

/// Live non-null cells per column and tag
#[derive(Debug, Clone)]
pub(crate) struct TagCounts {
    columns: Vec<[usize; 3]>,
}

impl TagCounts {
    pub(crate) fn new(columns: usize) -> Self {
        Self {
            columns: vec![[0; 3]; columns],
        }
    }

    fn bump(&mut self, column: usize, cell: &Cell, add: bool) {
        let (Some(value), Some(counts)) = (cell, self.columns.get_mut(column)) else {
            return;
        };
        let count = &mut counts[slot(value.kind())];
        if add {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
        }
    }

    pub(crate) fn add(&mut self, row: &Row) {
        for (column, cell) in row.cells().iter().enumerate() {
            self.bump(column, cell, true);
        }
    }

    pub(crate) fn remove(&mut self, row: &Row) {
        for (column, cell) in row.cells().iter().enumerate() {
            self.bump(column, cell, false);
        }
    }

    pub(crate) fn replace(&mut self, column: usize, old: &Cell, new: &Cell) {
        self.bump(column, old, false);
        self.bump(column, new, true);
    }

    /// Fails the way a full scan would when an ordering predicate meets a
    /// column holding another tag
    pub(crate) fn check(&self, filter: &Filter) -> Result<()> {
        for predicate in filter.groups().iter().flatten() {
            if predicate.operator == Operator::Eq {
                continue;
            }
            let Some(counts) = self.columns.get(predicate.column) else {
                continue;
            };
            let right = predicate.literal.kind();
            if let Some(&left) = KINDS
                .iter()
                .find(|&&kind| kind != right && counts[slot(kind)] > 0)
            {
                return Err(Error::TypeMismatch { left, right });
            }
        }
        Ok(())
    }
}
