//! ForestMap - one sorted index per column
//!
//! Rows live in an arena addressed by stable slot ids. Every column owns a
//! sorted map from cell value to the set of slot ids holding that value, so
//! any column can answer equality and range predicates directly:
//!
//! ```text
//! arena:   [0] (1, Alice, 3.5)   [1] (2, Bob, 3.8)   [2] <free>
//!
//! id:      1 -> {0}   2 -> {1}
//! name:    Alice -> {0}   Bob -> {1}
//! gpa:     3.5 -> {0}   3.8 -> {1}
//! ```
//!
//! Each predicate yields a candidate set from its column's index. Candidates
//! are intersected within an AND group and unioned across groups, and the
//! survivors go through the canonical evaluator for the final answer.
//!
//! Invariant: for every live row and every column there is exactly one
//! index entry, filed under the row's current cell (nulls included).

use shelfdb_core::{
    parse_cell, Cell, Condition, Error, Filter, Operator, Predicate, Record, Result, Row, Schema,
    Table, TableKind, Value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tracing::trace;

type Index = BTreeMap<Cell, BTreeSet<usize>>;

/// Multi-index table
#[derive(Debug)]
pub struct ForestMap {
    schema: Schema,
    rows: Vec<Option<Row>>,
    free: Vec<usize>,
    live: usize,
    indexes: Vec<Index>,
}

impl ForestMap {
    /// Creates an empty table with one index per column
    pub fn new(schema: Schema) -> Self {
        let indexes = (0..schema.len()).map(|_| Index::new()).collect();
        Self {
            schema,
            rows: Vec::new(),
            free: Vec::new(),
            live: 0,
            indexes,
        }
    }

    /// Number of distinct keys in a column's index
    pub fn distinct_values(&self, column: &str) -> Result<usize> {
        let column = self.schema.require(column)?;
        Ok(self.indexes[column].len())
    }

    /// Checks that every live row is indexed exactly once per column under
    /// its current value, and that no index refers to a dead slot
    pub fn verify_integrity(&self) -> bool {
        for (column, index) in self.indexes.iter().enumerate() {
            let entries: usize = index.values().map(BTreeSet::len).sum();
            if entries != self.live {
                return false;
            }
            for (id, slot) in self.rows.iter().enumerate() {
                let Some(row) = slot else { continue };
                let cell = row.cells()[column].clone();
                if !index.get(&cell).is_some_and(|ids| ids.contains(&id)) {
                    return false;
                }
            }
        }
        true
    }

    fn index_row(&mut self, id: usize, row: &Row) {
        for (index, cell) in self.indexes.iter_mut().zip(row.cells()) {
            index.entry(cell.clone()).or_default().insert(id);
        }
    }

    fn unindex(index: &mut Index, cell: &Cell, id: usize) {
        if let Some(ids) = index.get_mut(cell) {
            ids.remove(&id);
            if ids.is_empty() {
                index.remove(cell);
            }
        }
    }

    /// Slots whose cell can satisfy one predicate.
    ///
    /// Ordering predicates fail with a type mismatch when the column holds
    /// any non-null value of another tag, exactly as a full scan would.
    fn candidates(&self, predicate: &Predicate) -> Result<BTreeSet<usize>> {
        let index = &self.indexes[predicate.column];
        let literal = &predicate.literal;
        let key: Cell = Some(literal.clone());

        if predicate.operator != Operator::Eq {
            Self::check_tags(index, literal)?;
        }

        let same_tag = |(cell, _): &(&Cell, &BTreeSet<usize>)| {
            cell.as_ref().map(Value::kind) == Some(literal.kind())
        };

        let mut ids = BTreeSet::new();
        match predicate.operator {
            Operator::Eq => {
                if let Some(set) = index.get(&key) {
                    ids.extend(set.iter().copied());
                }
            }
            Operator::Gt | Operator::Ge => {
                let lower = if predicate.operator == Operator::Gt {
                    Bound::Excluded(&key)
                } else {
                    Bound::Included(&key)
                };
                for (_, set) in index.range((lower, Bound::Unbounded)).take_while(same_tag) {
                    ids.extend(set.iter().copied());
                }
            }
            Operator::Lt | Operator::Le => {
                let upper = if predicate.operator == Operator::Lt {
                    Bound::Excluded(&key)
                } else {
                    Bound::Included(&key)
                };
                let below = index.range((Bound::Unbounded, upper)).rev();
                for (_, set) in below.take_while(same_tag) {
                    ids.extend(set.iter().copied());
                }
            }
        }
        Ok(ids)
    }

    fn check_tags(index: &Index, literal: &Value) -> Result<()> {
        // Keys sort by tag, so the first and last non-null keys bound every tag present
        let first = index.keys().flatten().next();
        let last = index.keys().next_back().and_then(Option::as_ref);
        for value in [first, last].into_iter().flatten() {
            if value.kind() != literal.kind() {
                return Err(Error::TypeMismatch {
                    left: value.kind(),
                    right: literal.kind(),
                });
            }
        }
        Ok(())
    }

    /// Matching slot ids in ascending order
    fn matching(&self, filter: &Filter) -> Result<Vec<usize>> {
        if filter.is_unconditional() {
            return Ok(self.live_ids().collect());
        }

        let mut union = BTreeSet::new();
        for group in filter.groups() {
            let mut group_ids: Option<BTreeSet<usize>> = None;
            for predicate in group {
                let ids = self.candidates(predicate)?;
                group_ids = Some(match group_ids {
                    None => ids,
                    Some(acc) => acc.intersection(&ids).copied().collect(),
                });
            }
            union.extend(group_ids.unwrap_or_default());
        }
        trace!(candidates = union.len(), "index narrowed candidates");

        let mut hits = Vec::with_capacity(union.len());
        for id in union {
            if let Some(row) = self.rows[id].as_ref() {
                if filter.matches(row)? {
                    hits.push(id);
                }
            }
        }
        Ok(hits)
    }

    fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
    }
}

impl Table for ForestMap {
    fn kind(&self) -> TableKind {
        TableKind::ForestMap
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.live
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.rows.push(None);
                self.rows.len() - 1
            }
        };
        self.index_row(id, &row);
        self.rows[id] = Some(row);
        self.live += 1;
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        Ok(hits
            .into_iter()
            .filter_map(|id| self.rows[id].as_ref())
            .map(|row| self.schema.record(row))
            .collect())
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &id in &hits {
            let Some(row) = self.rows[id].as_mut() else {
                continue;
            };
            let old = row.set(column, cell.clone());
            if old != cell {
                let index = &mut self.indexes[column];
                Self::unindex(index, &old, id);
                index.entry(cell.clone()).or_default().insert(id);
            }
        }
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        for &id in &hits {
            let Some(row) = self.rows[id].take() else {
                continue;
            };
            for (index, cell) in self.indexes.iter_mut().zip(row.cells()) {
                Self::unindex(index, cell, id);
            }
            self.free.push(id);
            self.live -= 1;
        }
        Ok(hits.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ForestMap {
        let mut table = ForestMap::new(Schema::new(["id", "name", "gpa"]).unwrap());
        for row in [
            ["1", "Alice", "3.5"],
            ["2", "Bob", "3.8"],
            ["3", "Charlie", "3.2"],
            ["4", "David", "3.9"],
            ["5", "Eve", "3.5"],
            ["7", "Grace", "4.0"],
        ] {
            table.insert(&row).unwrap();
        }
        table
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.get("name").unwrap()).collect()
    }

    #[test]
    fn test_range_conjunction() {
        let mut table = table();
        let rows = table
            .select(&[
                Condition::new("gpa", Operator::Ge, "3.5"),
                Condition::and("gpa", Operator::Lt, "4.0"),
                Condition::and("id", Operator::Le, "5"),
            ])
            .unwrap();
        assert_eq!(names(&rows), vec!["Alice", "Bob", "David", "Eve"]);
    }

    #[test]
    fn test_union_across_groups() {
        let mut table = table();
        let rows = table
            .select(&[
                Condition::new("id", Operator::Gt, "4"),
                Condition::and("gpa", Operator::Le, "3.5"),
                Condition::or("name", Operator::Eq, "Bob"),
            ])
            .unwrap();
        assert_eq!(names(&rows), vec!["Bob", "Eve"]);
    }

    #[test]
    fn test_update_rethreads_changed_column() {
        let mut table = table();
        assert_eq!(table.distinct_values("gpa").unwrap(), 5);
        let changed = table
            .update("gpa", "3.5", &[Condition::new("name", Operator::Eq, "Bob")])
            .unwrap();
        assert_eq!(changed, 1);
        assert!(table.verify_integrity());
        assert_eq!(table.distinct_values("gpa").unwrap(), 4);

        let rows = table
            .select(&[Condition::new("gpa", Operator::Eq, "3.5")])
            .unwrap();
        assert_eq!(names(&rows), vec!["Alice", "Bob", "Eve"]);
        assert!(table
            .select(&[Condition::new("gpa", Operator::Eq, "3.8")])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_unindexes_every_column_and_reuses_slot() {
        let mut table = table();
        let removed = table
            .delete(&[Condition::new("name", Operator::Eq, "Charlie")])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(table.verify_integrity());
        assert_eq!(table.len(), 5);

        table.insert(&["8", "Heidi", "null"]).unwrap();
        assert_eq!(table.rows.len(), 6);
        assert!(table.verify_integrity());
        let rows = table
            .select(&[Condition::new("gpa", Operator::Le, "5.0")])
            .unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_ordering_across_tags_fails_like_a_scan() {
        let mut table = table();
        table.insert(&["9", "Ivan", "unknown"]).unwrap();
        let err = table
            .select(&[Condition::new("gpa", Operator::Gt, "3.0")])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        // Equality across tags is simply false
        assert!(table
            .select(&[Condition::new("id", Operator::Eq, "1.0")])
            .unwrap()
            .is_empty());
    }
}
