//! # ShelfDB
//!
//! An in-process tabular store. Every table has a fixed column schema and
//! one of seven interchangeable storage strategies, each tuned for a
//! different access pattern. All of them honour the same contract and
//! return the same rows for the same calls.
//!
//! ## Quick Start
//!
//! ```rust
//! use shelfdb::{Condition, Database, Operator, TableKind};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut db = Database::in_memory();
//!
//!     // The name prefix picks the strategy
//!     let kind = db.create_table("forest_students", &["id", "name", "gpa"])?;
//!     assert_eq!(kind, TableKind::ForestMap);
//!
//!     db.insert("forest_students", &["1", "Alice", "3.5"])?;
//!     db.insert("forest_students", &["2", "Bob", "3.8"])?;
//!
//!     let rows = db.select(
//!         "forest_students",
//!         &[Condition::new("gpa", Operator::Gt, "3.6")],
//!     )?;
//!     assert_eq!(rows[0].get("name"), Some("Bob"));
//!     Ok(())
//! }
//! ```
//!
//! ## Strategies
//!
//! | Prefix        | Strategy         | Built for                          |
//! |---------------|------------------|------------------------------------|
//! | `backwards_`  | BackwardsStack   | reads of recently inserted rows    |
//! | `leaky_`      | LeakyBucket      | bounded hot buffer with spill-over |
//! | `ping_`       | PingPong         | skewed, shifting access            |
//! | `random_`     | RandomQueue      | spreading load across shards       |
//! | `forest_`     | ForestMap        | range predicates on any column     |
//! | `lfu_`        | LFU              | repeated primary key lookups       |
//! | anything else | Chunk            | general purpose, key lookups       |
//!
//! ## Condition lists
//!
//! A condition list is a flat sequence of predicates joined by AND/OR.
//! AND binds tighter than OR: `a AND b OR c` means `(a AND b) OR c`. An
//! empty list matches every row.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;
use tracing::info;

pub mod logging;
pub mod monitor;

// Core types
pub use shelfdb_core::{
    parse_cell, Cell, Condition, Connector, Error, Filter, Operator, Record, Result, Row, Schema,
    Table, TableKind, Value, ValueKind,
};

// Storage strategies
pub use shelfdb_storage::{
    open_table, BackwardsStack, ChunkConfig, ChunkStats, ChunkTable, ForestMap, LeakyBucket,
    LeakyBucketConfig, LeakyBucketStats, LfuConfig, LfuStats, LfuTable, PingPong, PingPongConfig,
    PingPongStats, RandomQueue, RandomQueueConfig, RandomQueueStats, StorageConfig,
};

pub use monitor::{OpStats, TableMonitor, TableStats};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const PREFIXES: [(&str, TableKind); 6] = [
    ("backwards_", TableKind::BackwardsStack),
    ("leaky_", TableKind::LeakyBucket),
    ("ping_", TableKind::PingPong),
    ("random_", TableKind::RandomQueue),
    ("forest_", TableKind::ForestMap),
    ("lfu_", TableKind::Lfu),
];

/// Strategy chosen for a table name. Prefixes are matched
/// case-insensitively; `chunk_` and unprefixed names map to Chunk.
pub fn kind_for_table_name(name: &str) -> TableKind {
    let lower = name.to_ascii_lowercase();
    PREFIXES
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map_or(TableKind::Chunk, |(_, kind)| *kind)
}

/// A registry of named tables.
///
/// Each table is created once with a fixed schema and strategy and wrapped
/// in a [`TableMonitor`]. Operations are synchronous and run to completion;
/// the registry is single-threaded and needs `&mut self` for every call
/// that may touch table state (including `select`, since several
/// strategies adjust internal counters and caches while reading).
///
/// # Examples
///
/// ```rust
/// use shelfdb::{Condition, Database, Operator};
///
/// let mut db = Database::in_memory();
/// db.create_table("lfu_users", &["id", "name"])?;
/// db.insert("lfu_users", &["7", "Grace"])?;
///
/// let changed = db.update(
///     "lfu_users",
///     "name",
///     "Grace H.",
///     &[Condition::new("id", Operator::Eq, "7")],
/// )?;
/// assert_eq!(changed, 1);
/// # Ok::<(), shelfdb::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Database {
    config: StorageConfig,
    tables: HashMap<String, TableMonitor>,
}

impl Database {
    /// Creates an empty registry with default strategy settings
    pub fn in_memory() -> Self {
        Self::with_config(StorageConfig::default())
    }

    /// Creates an empty registry whose tables use the given settings
    pub fn with_config(config: StorageConfig) -> Self {
        info!("Opening ShelfDB registry");
        Self {
            config,
            tables: HashMap::new(),
        }
    }

    /// Strategy settings applied to new tables
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Creates a table, choosing the strategy from the name prefix
    pub fn create_table(&mut self, name: &str, columns: &[&str]) -> Result<TableKind> {
        let kind = kind_for_table_name(name);
        self.create_table_with_kind(name, kind, columns)?;
        Ok(kind)
    }

    /// Creates a table with an explicit strategy
    pub fn create_table_with_kind(
        &mut self,
        name: &str,
        kind: TableKind,
        columns: &[&str],
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidSchema("empty table name".to_string()));
        }
        if self.tables.contains_key(name) {
            return Err(Error::TableExists(name.to_string()));
        }
        let schema = Schema::new(columns.iter().copied())?;
        let table = open_table(kind, schema, &self.config);
        self.tables
            .insert(name.to_string(), TableMonitor::new(name, table));
        info!(table = name, %kind, columns = columns.len(), "Created table");
        Ok(())
    }

    /// Removes a table and all its rows
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        match self.tables.remove(name) {
            Some(table) => {
                info!(table = name, rows = table.len(), "Dropped table");
                Ok(())
            }
            None => Err(Error::TableNotFound(name.to_string())),
        }
    }

    /// Drops every table
    pub fn reset(&mut self) {
        let dropped = self.tables.len();
        self.tables.clear();
        info!(tables = dropped, "Reset registry");
    }

    /// True when a table with this name exists
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in sorted order
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Strategy behind a table
    pub fn kind(&self, name: &str) -> Result<TableKind> {
        Ok(self.table(name)?.kind())
    }

    /// Column names of a table in schema order
    pub fn columns(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.table(name)?.columns().to_vec())
    }

    /// Number of live rows in a table
    pub fn row_count(&self, name: &str) -> Result<usize> {
        Ok(self.table(name)?.len())
    }

    /// Appends one row
    pub fn insert(&mut self, name: &str, values: &[&str]) -> Result<()> {
        self.table_mut(name)?.insert(values)
    }

    /// Returns copies of every matching row
    pub fn select(&mut self, name: &str, conditions: &[Condition]) -> Result<Vec<Record>> {
        self.table_mut(name)?.select(conditions)
    }

    /// Sets `column` to `value` on every matching row
    pub fn update(
        &mut self,
        name: &str,
        column: &str,
        value: &str,
        conditions: &[Condition],
    ) -> Result<usize> {
        self.table_mut(name)?.update(column, value, conditions)
    }

    /// Removes every matching row
    pub fn delete(&mut self, name: &str, conditions: &[Condition]) -> Result<usize> {
        self.table_mut(name)?.delete(conditions)
    }

    /// Operation statistics of a table
    pub fn stats(&self, name: &str) -> Result<&TableStats> {
        Ok(self.table(name)?.stats())
    }

    /// Plain-text performance report of a table
    pub fn report(&self, name: &str) -> Result<String> {
        Ok(self.table(name)?.report())
    }

    fn table(&self, name: &str) -> Result<&TableMonitor> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableMonitor> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }
}
