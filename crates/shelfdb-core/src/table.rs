//! The table contract shared by every storage strategy.

use crate::condition::Condition;
use crate::row::{Record, Schema};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage strategy behind a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    /// LIFO sequence scanned newest-first
    BackwardsStack,
    /// Capacity-bounded main buffer leaking into an overflow buffer
    LeakyBucket,
    /// Hot/cold lists driven by access counters
    PingPong,
    /// Round-robin sharded FIFO queues
    RandomQueue,
    /// One sorted index per column over a row arena
    ForestMap,
    /// Fixed-size compactable chunks with a primary key index
    Chunk,
    /// Frequency-ranked cache over a backing list
    Lfu,
}

impl TableKind {
    /// Every strategy, in a stable order
    pub const ALL: [TableKind; 7] = [
        TableKind::BackwardsStack,
        TableKind::LeakyBucket,
        TableKind::PingPong,
        TableKind::RandomQueue,
        TableKind::ForestMap,
        TableKind::Chunk,
        TableKind::Lfu,
    ];

    /// Human readable strategy name
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::BackwardsStack => "BackwardsStack",
            TableKind::LeakyBucket => "LeakyBucket",
            TableKind::PingPong => "PingPong",
            TableKind::RandomQueue => "RandomQueue",
            TableKind::ForestMap => "ForestMap",
            TableKind::Chunk => "Chunk",
            TableKind::Lfu => "LFU",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations every storage strategy implements.
///
/// All strategies must return the same rows for the same sequence of calls;
/// only their internal layout and cost profile differ. `select` takes
/// `&mut self` because several strategies adjust internal state (access
/// counters, caches, index repairs) while reading.
pub trait Table {
    /// Strategy implementing this table
    fn kind(&self) -> TableKind;

    /// Schema fixed at creation
    fn schema(&self) -> &Schema;

    /// Column names in schema order
    fn columns(&self) -> &[String] {
        self.schema().columns()
    }

    /// Number of live rows
    fn len(&self) -> usize;

    /// True when no live rows remain
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one row given as one text value per column
    fn insert(&mut self, values: &[&str]) -> Result<()>;

    /// Returns copies of all rows matching the condition list
    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>>;

    /// Sets `column` to `value` on every matching row, returning the count
    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize>;

    /// Removes every matching row, returning the count
    fn delete(&mut self, conditions: &[Condition]) -> Result<usize>;
}

impl<T: Table + ?Sized> Table for Box<T> {
    fn kind(&self) -> TableKind {
        (**self).kind()
    }

    fn schema(&self) -> &Schema {
        (**self).schema()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        (**self).insert(values)
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        (**self).select(conditions)
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        (**self).update(column, value, conditions)
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        (**self).delete(conditions)
    }
}
