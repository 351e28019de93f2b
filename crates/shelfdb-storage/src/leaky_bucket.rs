//! LeakyBucket - two-tier buffered row storage
//!
//! New rows land in a bounded *main* bucket. Once main's live size reaches
//! the leak threshold, the oldest batch of live rows leaks into an unbounded
//! *overflow* bucket before the new row is added. Overflow rows that keep
//! matching queries are promoted back into main while it has headroom.
//!
//! Both buckets delete by tombstoning a slot and are compacted once their
//! tombstone count passes a limit. Every scan covers both buckets.

use serde::Serialize;
use shelfdb_core::{parse_cell, Condition, Filter, Record, Result, Row, Schema, Table, TableKind};
use tracing::debug;

/// LeakyBucket configuration
#[derive(Debug, Clone)]
pub struct LeakyBucketConfig {
    /// Nominal size of the main bucket
    pub main_capacity: usize,
    /// Live main rows that trigger a leak on the next insert
    pub leak_threshold: usize,
    /// Oldest live rows moved to overflow per leak
    pub leak_batch: usize,
    /// Matches an overflow row needs before it is promoted back to main
    pub promote_after: u32,
    /// Tombstones a bucket may hold before it is compacted
    pub tombstone_limit: usize,
}

impl Default for LeakyBucketConfig {
    fn default() -> Self {
        Self {
            main_capacity: 1000,
            leak_threshold: 850,
            leak_batch: 150,
            promote_after: 3,
            tombstone_limit: 128,
        }
    }
}

/// Maintenance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeakyBucketStats {
    /// Leaks performed
    pub leaks: u64,
    /// Rows moved from main to overflow
    pub rows_leaked: u64,
    /// Rows moved from overflow back to main
    pub promotions: u64,
    /// Bucket compactions
    pub compactions: u64,
}

#[derive(Debug)]
struct Slot {
    row: Row,
    hits: u32,
}

/// Append-only slot list with tombstones
#[derive(Debug, Default)]
struct Bucket {
    slots: Vec<Option<Slot>>,
    live: usize,
}

impl Bucket {
    fn push(&mut self, row: Row) {
        self.slots.push(Some(Slot { row, hits: 0 }));
        self.live += 1;
    }

    fn remove(&mut self, pos: usize) -> Option<Slot> {
        let slot = self.slots.get_mut(pos)?.take()?;
        self.live -= 1;
        Some(slot)
    }

    fn slot_mut(&mut self, pos: usize) -> Option<&mut Slot> {
        self.slots.get_mut(pos).and_then(Option::as_mut)
    }

    fn tombstones(&self) -> usize {
        self.slots.len() - self.live
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
    }

    /// Live slots, oldest first
    fn live(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| slot.as_ref().map(|slot| (pos, slot)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Main,
    Overflow,
}

/// Two-tier buffered table
#[derive(Debug)]
pub struct LeakyBucket {
    schema: Schema,
    config: LeakyBucketConfig,
    main: Bucket,
    overflow: Bucket,
    stats: LeakyBucketStats,
}

impl LeakyBucket {
    /// Creates an empty table with default thresholds
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, LeakyBucketConfig::default())
    }

    /// Creates an empty table with the given thresholds
    pub fn with_config(schema: Schema, config: LeakyBucketConfig) -> Self {
        Self {
            schema,
            main: Bucket {
                slots: Vec::with_capacity(config.main_capacity),
                live: 0,
            },
            overflow: Bucket::default(),
            config,
            stats: LeakyBucketStats::default(),
        }
    }

    /// Live rows in the main bucket
    pub fn main_len(&self) -> usize {
        self.main.live
    }

    /// Live rows in the overflow bucket
    pub fn overflow_len(&self) -> usize {
        self.overflow.live
    }

    /// Maintenance counters
    pub fn stats(&self) -> LeakyBucketStats {
        self.stats
    }

    fn leak_threshold(&self) -> usize {
        self.config.leak_threshold.min(self.config.main_capacity)
    }

    fn bucket_mut(&mut self, tier: Tier) -> &mut Bucket {
        match tier {
            Tier::Main => &mut self.main,
            Tier::Overflow => &mut self.overflow,
        }
    }

    /// Moves the oldest live main rows into overflow
    fn leak(&mut self) {
        let oldest: Vec<usize> = self
            .main
            .live()
            .map(|(pos, _)| pos)
            .take(self.config.leak_batch)
            .collect();
        for &pos in &oldest {
            if let Some(slot) = self.main.remove(pos) {
                self.overflow.push(slot.row);
            }
        }
        self.main.compact();

        self.stats.leaks += 1;
        self.stats.rows_leaked += oldest.len() as u64;
        debug!(
            rows = oldest.len(),
            main = self.main.live,
            overflow = self.overflow.live,
            "leaked oldest rows into overflow"
        );
    }

    /// Matching slots, overflow first so results run oldest to newest
    fn matching(&self, filter: &Filter) -> Result<Vec<(Tier, usize)>> {
        let mut hits = Vec::new();
        for (tier, bucket) in [(Tier::Overflow, &self.overflow), (Tier::Main, &self.main)] {
            for (pos, slot) in bucket.live() {
                if filter.matches(&slot.row)? {
                    hits.push((tier, pos));
                }
            }
        }
        Ok(hits)
    }

    fn record(&self, tier: Tier, pos: usize) -> Option<Record> {
        let bucket = match tier {
            Tier::Main => &self.main,
            Tier::Overflow => &self.overflow,
        };
        bucket.slots.get(pos)?.as_ref().map(|slot| self.schema.record(&slot.row))
    }

    /// Counts a match on every hit and promotes overflow rows that earned it
    fn touch(&mut self, hits: &[(Tier, usize)]) {
        let mut eligible = Vec::new();
        for &(tier, pos) in hits {
            let promote_after = self.config.promote_after;
            if let Some(slot) = self.bucket_mut(tier).slot_mut(pos) {
                slot.hits = slot.hits.saturating_add(1);
                if tier == Tier::Overflow && slot.hits >= promote_after {
                    eligible.push(pos);
                }
            }
        }

        let mut promoted = 0u64;
        for pos in eligible {
            if self.main.live >= self.leak_threshold() {
                break;
            }
            if let Some(slot) = self.overflow.remove(pos) {
                self.main.push(slot.row);
                promoted += 1;
            }
        }
        if promoted > 0 {
            self.stats.promotions += promoted;
            debug!(rows = promoted, "promoted overflow rows into main");
        }
        self.compact_if_needed();
    }

    fn compact_if_needed(&mut self) {
        let limit = self.config.tombstone_limit;
        for tier in [Tier::Main, Tier::Overflow] {
            let bucket = self.bucket_mut(tier);
            if bucket.tombstones() > limit {
                let dropped = bucket.tombstones();
                bucket.compact();
                self.stats.compactions += 1;
                debug!(?tier, tombstones = dropped, "compacted bucket");
            }
        }
    }
}

impl Table for LeakyBucket {
    fn kind(&self) -> TableKind {
        TableKind::LeakyBucket
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.main.live + self.overflow.live
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        if self.main.live >= self.leak_threshold() {
            self.leak();
        }
        self.main.push(row);
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        let records = hits
            .iter()
            .filter_map(|&(tier, pos)| self.record(tier, pos))
            .collect();
        self.touch(&hits);
        Ok(records)
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &(tier, pos) in &hits {
            if let Some(slot) = self.bucket_mut(tier).slot_mut(pos) {
                slot.row.set(column, cell.clone());
            }
        }
        self.touch(&hits);
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        for &(tier, pos) in &hits {
            self.bucket_mut(tier).remove(pos);
        }
        self.compact_if_needed();
        Ok(hits.len())
    }
}
