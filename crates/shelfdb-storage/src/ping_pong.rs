//! PingPong - hot/cold row lists
//!
//! Rows start on the inactive (cold) list with an access count of one.
//! Every select or update that matches a row bumps its count, and a cold row
//! reaching the hot threshold moves to the active list. Every
//! `rebalance_interval` operations all counts are halved (never below one)
//! and every row is reclassified, so rows that stop being queried drift
//! back to cold.

use crate::drain_positions;
use serde::Serialize;
use shelfdb_core::{parse_cell, Condition, Filter, Record, Result, Row, Schema, Table, TableKind};
use tracing::debug;

/// PingPong configuration
#[derive(Debug, Clone)]
pub struct PingPongConfig {
    /// Access count at which a row counts as hot
    pub hot_threshold: u32,
    /// Operations between decay and reclassification passes
    pub rebalance_interval: u64,
}

impl Default for PingPongConfig {
    fn default() -> Self {
        Self {
            hot_threshold: 3,
            rebalance_interval: 5000,
        }
    }
}

/// Maintenance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PingPongStats {
    /// Rows moved from inactive to active on access
    pub promotions: u64,
    /// Decay and reclassification passes
    pub rebalances: u64,
}

#[derive(Debug)]
struct Entry {
    row: Row,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Active,
    Inactive,
}

/// Hot/cold table
#[derive(Debug)]
pub struct PingPong {
    schema: Schema,
    config: PingPongConfig,
    active: Vec<Entry>,
    inactive: Vec<Entry>,
    ops: u64,
    stats: PingPongStats,
}

impl PingPong {
    /// Creates an empty table with default thresholds
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, PingPongConfig::default())
    }

    /// Creates an empty table with the given thresholds
    pub fn with_config(schema: Schema, config: PingPongConfig) -> Self {
        Self {
            schema,
            config,
            active: Vec::new(),
            inactive: Vec::new(),
            ops: 0,
            stats: PingPongStats::default(),
        }
    }

    /// Rows on the hot list
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Rows on the cold list
    pub fn inactive_len(&self) -> usize {
        self.inactive.len()
    }

    /// Maintenance counters
    pub fn stats(&self) -> PingPongStats {
        self.stats
    }

    fn list(&self, side: Side) -> &[Entry] {
        match side {
            Side::Active => &self.active,
            Side::Inactive => &self.inactive,
        }
    }

    fn list_mut(&mut self, side: Side) -> &mut Vec<Entry> {
        match side {
            Side::Active => &mut self.active,
            Side::Inactive => &mut self.inactive,
        }
    }

    /// Matching positions, hot list first, ascending within each list
    fn matching(&self, filter: &Filter) -> Result<Vec<(Side, usize)>> {
        let mut hits = Vec::new();
        for side in [Side::Active, Side::Inactive] {
            for (pos, entry) in self.list(side).iter().enumerate() {
                if filter.matches(&entry.row)? {
                    hits.push((side, pos));
                }
            }
        }
        Ok(hits)
    }

    /// Bumps access counts and promotes cold rows that turned hot
    fn touch(&mut self, hits: &[(Side, usize)]) {
        let threshold = self.config.hot_threshold;
        let mut promote = Vec::new();
        for &(side, pos) in hits {
            let entry = &mut self.list_mut(side)[pos];
            entry.hits = entry.hits.saturating_add(1);
            if side == Side::Inactive && entry.hits >= threshold {
                promote.push(pos);
            }
        }

        if !promote.is_empty() {
            let moved = drain_positions(&mut self.inactive, &promote);
            self.stats.promotions += moved.len() as u64;
            debug!(rows = moved.len(), "promoted rows to active list");
            self.active.extend(moved);
        }
    }

    /// Counts one operation and runs the periodic rebalance when due
    fn tick(&mut self) {
        self.ops += 1;
        if self.ops >= self.config.rebalance_interval {
            self.rebalance();
        }
    }

    fn rebalance(&mut self) {
        self.ops = 0;
        let threshold = self.config.hot_threshold;
        let entries: Vec<Entry> = self.active.drain(..).chain(self.inactive.drain(..)).collect();
        for mut entry in entries {
            entry.hits = (entry.hits / 2).max(1);
            if entry.hits >= threshold {
                self.active.push(entry);
            } else {
                self.inactive.push(entry);
            }
        }
        self.stats.rebalances += 1;
        debug!(
            active = self.active.len(),
            inactive = self.inactive.len(),
            "decayed access counts and reclassified rows"
        );
    }
}

impl Table for PingPong {
    fn kind(&self) -> TableKind {
        TableKind::PingPong
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        self.inactive.push(Entry { row, hits: 1 });
        self.tick();
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        let records = hits
            .iter()
            .map(|&(side, pos)| self.schema.record(&self.list(side)[pos].row))
            .collect();
        self.touch(&hits);
        self.tick();
        Ok(records)
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &(side, pos) in &hits {
            self.list_mut(side)[pos].row.set(column, cell.clone());
        }
        self.touch(&hits);
        self.tick();
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        let mut active = Vec::new();
        let mut inactive = Vec::new();
        for &(side, pos) in &hits {
            match side {
                Side::Active => active.push(pos),
                Side::Inactive => inactive.push(pos),
            }
        }

        drain_positions(&mut self.active, &active);
        drain_positions(&mut self.inactive, &inactive);
        self.tick();
        Ok(hits.len())
    }
}
