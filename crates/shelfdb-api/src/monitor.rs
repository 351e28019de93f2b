//! Per-table operation statistics.
//!
//! [`TableMonitor`] wraps any strategy and implements the same [`Table`]
//! contract, counting calls, failures and rows and accumulating wall-clock
//! time per operation. Every table in a [`crate::Database`] is wrapped in
//! one.

use serde::Serialize;
use shelfdb_core::{Condition, Record, Result, Schema, Table, TableKind};
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tracing::debug;

/// Counters for one operation type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpStats {
    /// Calls made, failed or not
    pub calls: u64,
    /// Calls that returned an error
    pub failures: u64,
    /// Rows returned (select) or affected (update, delete, insert)
    pub rows: u64,
    /// Cumulative wall-clock time
    pub elapsed: Duration,
}

impl OpStats {
    fn record<T>(&mut self, elapsed: Duration, result: &Result<T>, rows: impl FnOnce(&T) -> usize) {
        self.calls += 1;
        self.elapsed += elapsed;
        match result {
            Ok(value) => self.rows += rows(value) as u64,
            Err(_) => self.failures += 1,
        }
    }

    /// Mean time per call
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            return Duration::ZERO;
        }
        let nanos = self.elapsed.as_nanos() / u128::from(self.calls);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Statistics for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Insert counters
    pub insert: OpStats,
    /// Select counters
    pub select: OpStats,
    /// Update counters
    pub update: OpStats,
    /// Delete counters
    pub delete: OpStats,
    /// Selects that returned no rows
    pub empty_selects: u64,
}

impl TableStats {
    /// Calls across all operations
    pub fn total_calls(&self) -> u64 {
        self.insert.calls + self.select.calls + self.update.calls + self.delete.calls
    }

    /// Share of successful selects that found at least one row
    pub fn select_hit_ratio(&self) -> Option<f64> {
        let answered = self.select.calls - self.select.failures;
        if answered == 0 {
            return None;
        }
        Some((answered - self.empty_selects) as f64 / answered as f64)
    }
}

/// Statistics-collecting wrapper around a table
pub struct TableMonitor {
    name: String,
    table: Box<dyn Table>,
    stats: TableStats,
}

impl TableMonitor {
    /// Wraps a table under the given name
    pub fn new(name: impl Into<String>, table: Box<dyn Table>) -> Self {
        Self {
            name: name.into(),
            table,
            stats: TableStats::default(),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collected statistics
    pub fn stats(&self) -> &TableStats {
        &self.stats
    }

    /// Clears the collected statistics
    pub fn reset_stats(&mut self) {
        self.stats = TableStats::default();
    }

    /// Renders a plain-text performance report
    pub fn report(&self) -> String {
        let stats = &self.stats;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Performance Report for {} ({}) ===",
            self.name,
            self.table.kind()
        );
        let _ = writeln!(out, "Rows: {}", self.table.len());

        let ops = [
            ("insert", &stats.insert),
            ("select", &stats.select),
            ("update", &stats.update),
            ("delete", &stats.delete),
        ];
        let _ = writeln!(out, "\nOperation Counts:");
        for (op, s) in ops {
            let _ = writeln!(
                out,
                "{:<7} calls: {:>8}  failures: {:>6}  rows: {:>10}",
                op, s.calls, s.failures, s.rows
            );
        }

        let _ = writeln!(out, "\nAverage Operation Times (ms):");
        for (op, s) in ops {
            let _ = writeln!(out, "{:<7} {:.3}", op, s.average().as_secs_f64() * 1000.0);
        }

        if let Some(ratio) = stats.select_hit_ratio() {
            let _ = writeln!(out, "\nSelect Hit Ratio: {:.2}%", ratio * 100.0);
        }
        out
    }

    fn failed(&self, op: &str, err: &shelfdb_core::Error) {
        debug!(table = %self.name, op, error = %err, "operation failed");
    }
}

impl std::fmt::Debug for TableMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMonitor")
            .field("name", &self.name)
            .field("kind", &self.table.kind())
            .field("rows", &self.table.len())
            .finish()
    }
}

impl Table for TableMonitor {
    fn kind(&self) -> TableKind {
        self.table.kind()
    }

    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let start = Instant::now();
        let result = self.table.insert(values);
        self.stats.insert.record(start.elapsed(), &result, |_| 1);
        if let Err(err) = &result {
            self.failed("insert", err);
        }
        result
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let start = Instant::now();
        let result = self.table.select(conditions);
        self.stats.select.record(start.elapsed(), &result, Vec::len);
        match &result {
            Ok(rows) if rows.is_empty() => self.stats.empty_selects += 1,
            Ok(_) => {}
            Err(err) => self.failed("select", err),
        }
        result
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let start = Instant::now();
        let result = self.table.update(column, value, conditions);
        self.stats.update.record(start.elapsed(), &result, |n| *n);
        if let Err(err) = &result {
            self.failed("update", err);
        }
        result
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let start = Instant::now();
        let result = self.table.delete(conditions);
        self.stats.delete.record(start.elapsed(), &result, |n| *n);
        if let Err(err) = &result {
            self.failed("delete", err);
        }
        result
    }
}
