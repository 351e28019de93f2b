//! RandomQueue - sharded FIFO queues
//!
//! Rows are dealt round-robin across a fixed number of FIFO queues. Each row
//! remembers the queue it was first assigned to (its home). A rebalance
//! redistributes rows evenly, keeping a row in its home queue while that
//! queue has room, and fires either when the operation interval has passed
//! and the queues have drifted apart, or after heavy deletes.

use serde::Serialize;
use shelfdb_core::{parse_cell, Condition, Filter, Record, Result, Row, Schema, Table, TableKind};
use std::collections::VecDeque;
use tracing::debug;

/// RandomQueue configuration
#[derive(Debug, Clone)]
pub struct RandomQueueConfig {
    /// Number of queues
    pub queue_count: usize,
    /// Operations between imbalance checks
    pub rebalance_interval: u64,
    /// Largest queue may exceed the smallest by this factor before a rebalance
    pub imbalance_factor: f64,
    /// Share of rows deleted since the last rebalance that forces one
    pub heavy_delete_ratio: f64,
}

impl Default for RandomQueueConfig {
    fn default() -> Self {
        Self {
            queue_count: 4,
            rebalance_interval: 5000,
            imbalance_factor: 2.0,
            heavy_delete_ratio: 0.25,
        }
    }
}

/// Maintenance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RandomQueueStats {
    /// Rebalance passes
    pub rebalances: u64,
    /// Rows that ended a rebalance outside their home queue
    pub rows_displaced: u64,
}

#[derive(Debug)]
struct Entry {
    home: usize,
    row: Row,
}

/// Sharded FIFO table
#[derive(Debug)]
pub struct RandomQueue {
    schema: Schema,
    config: RandomQueueConfig,
    queues: Vec<VecDeque<Entry>>,
    next: usize,
    ops: u64,
    deleted_since: usize,
    stats: RandomQueueStats,
}

impl RandomQueue {
    /// Creates an empty table with default queue settings
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, RandomQueueConfig::default())
    }

    /// Creates an empty table. A queue count of zero is treated as one.
    pub fn with_config(schema: Schema, config: RandomQueueConfig) -> Self {
        let queues = (0..config.queue_count.max(1)).map(|_| VecDeque::new()).collect();
        Self {
            schema,
            config,
            queues,
            next: 0,
            ops: 0,
            deleted_since: 0,
            stats: RandomQueueStats::default(),
        }
    }

    /// Current size of every queue
    pub fn queue_sizes(&self) -> Vec<usize> {
        self.queues.iter().map(VecDeque::len).collect()
    }

    /// Maintenance counters
    pub fn stats(&self) -> RandomQueueStats {
        self.stats
    }

    /// Matching (queue, position) pairs in queue order
    fn matching(&self, filter: &Filter) -> Result<Vec<(usize, usize)>> {
        let mut hits = Vec::new();
        for (q, queue) in self.queues.iter().enumerate() {
            for (pos, entry) in queue.iter().enumerate() {
                if filter.matches(&entry.row)? {
                    hits.push((q, pos));
                }
            }
        }
        Ok(hits)
    }

    fn is_imbalanced(&self) -> bool {
        let sizes = self.queue_sizes();
        let largest = sizes.iter().copied().max().unwrap_or(0);
        let smallest = sizes.iter().copied().min().unwrap_or(0);
        largest as f64 > smallest as f64 * self.config.imbalance_factor
    }

    fn heavy_deletes(&self) -> bool {
        let window = self.len() + self.deleted_since;
        self.deleted_since > 0
            && self.deleted_since as f64 > window as f64 * self.config.heavy_delete_ratio
    }

    /// Counts one operation and rebalances when a trigger fires
    fn tick(&mut self) {
        self.ops += 1;
        let due = self.ops >= self.config.rebalance_interval && self.is_imbalanced();
        if due || self.heavy_deletes() {
            self.rebalance();
        } else if self.ops >= self.config.rebalance_interval {
            self.ops = 0;
        }
    }

    /// Spreads rows evenly, preferring each row's home queue
    fn rebalance(&mut self) {
        let n = self.queues.len();
        let total = self.len();
        let targets: Vec<usize> = (0..n)
            .map(|q| total / n + usize::from(q < total % n))
            .collect();

        let mut placed: Vec<VecDeque<Entry>> = (0..n).map(|_| VecDeque::new()).collect();
        let mut displaced = Vec::new();
        for queue in self.queues.iter_mut() {
            for entry in queue.drain(..) {
                let home = entry.home % n;
                if placed[home].len() < targets[home] {
                    placed[home].push_back(entry);
                } else {
                    displaced.push(entry);
                }
            }
        }

        let moved = displaced.len();
        let mut displaced = displaced.into_iter();
        for (q, queue) in placed.iter_mut().enumerate() {
            while queue.len() < targets[q] {
                match displaced.next() {
                    Some(entry) => queue.push_back(entry),
                    None => break,
                }
            }
        }

        self.queues = placed;
        self.ops = 0;
        self.deleted_since = 0;
        self.stats.rebalances += 1;
        self.stats.rows_displaced += moved as u64;
        debug!(rows = total, displaced = moved, sizes = ?self.queue_sizes(), "rebalanced queues");
    }
}

impl Table for RandomQueue {
    fn kind(&self) -> TableKind {
        TableKind::RandomQueue
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        let home = self.next;
        self.next = (self.next + 1) % self.queues.len();
        self.queues[home].push_back(Entry { home, row });
        self.tick();
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        let records = hits
            .into_iter()
            .map(|(q, pos)| self.schema.record(&self.queues[q][pos].row))
            .collect();
        self.tick();
        Ok(records)
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &(q, pos) in &hits {
            self.queues[q][pos].row.set(column, cell.clone());
        }
        self.tick();
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;

        let mut doomed = hits.iter().peekable();
        for (q, queue) in self.queues.iter_mut().enumerate() {
            let mut pos = 0;
            queue.retain(|_| {
                let drop = doomed.next_if_eq(&&(q, pos)).is_some();
                pos += 1;
                !drop
            });
        }

        self.deleted_since += hits.len();
        self.tick();
        Ok(hits.len())
    }
}
