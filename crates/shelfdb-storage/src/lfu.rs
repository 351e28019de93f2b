//! LFU - frequency-ranked key cache over a backing list
//!
//! Every row lives in an insertion-ordered backing list. A bounded cache
//! maps primary keys to backing rows and ranks them by access frequency:
//!
//! ```text
//! buckets:  1 -> [k9, k4]      min_frequency = 1
//!           3 -> [k2]
//!
//! entries:  k2 -> row #17, freq 3
//!           k4 -> row #40, freq 1
//!           k9 -> row #31, freq 1
//! ```
//!
//! Within a bucket keys are ordered by when they entered it, so eviction
//! removes the key that has sat longest at the minimum frequency.
//!
//! Only key-equality lookups on a key held by exactly one row go through the
//! cache. A hit re-checks the cached row against the whole condition list
//! and bumps its frequency when it matches; a miss scans the backing list
//! and admits the match at frequency one. Cache entries point at backing
//! rows rather than copies, so an update through either path mutates the
//! one stored row. Per-column tag counts make a cached lookup fail with
//! the same type error a scan would raise.

use crate::drain_positions;
use crate::tags::TagCounts;
use serde::Serialize;
use shelfdb_core::{
    parse_cell, Condition, Filter, Record, Result, Row, Schema, Table, TableKind, Value,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

type RowId = u64;

/// LFU configuration
#[derive(Debug, Clone)]
pub struct LfuConfig {
    /// Maximum number of cached keys
    pub capacity: usize,
}

impl Default for LfuConfig {
    fn default() -> Self {
        Self { capacity: 128 }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LfuStats {
    /// Key lookups answered from the cache
    pub hits: u64,
    /// Key lookups that fell back to the backing list
    pub misses: u64,
    /// Keys evicted to make room
    pub evictions: u64,
    /// Keys admitted into the cache
    pub admissions: u64,
}

/// Outcome of offering a key to the cache
#[derive(Debug, PartialEq)]
enum Admission {
    /// Zero capacity, nothing cached
    Refused,
    /// Key was already cached; its row was refreshed
    Refreshed,
    /// Key cached at frequency one, with the key evicted to make room
    Admitted(Option<(Value, u64)>),
}

#[derive(Debug)]
struct CacheEntry {
    row: RowId,
    frequency: u64,
    tick: u64,
}

/// Frequency buckets with a tracked minimum
#[derive(Debug)]
struct LfuCache {
    capacity: usize,
    entries: HashMap<Value, CacheEntry>,
    /// frequency -> (entry tick -> key)
    buckets: BTreeMap<u64, BTreeMap<u64, Value>>,
    min_frequency: u64,
    clock: u64,
}

impl LfuCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            buckets: BTreeMap::new(),
            min_frequency: 0,
            clock: 0,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    fn get(&self, key: &Value) -> Option<RowId> {
        self.entries.get(key).map(|entry| entry.row)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn detach(&mut self, frequency: u64, tick: u64) {
        if let Some(bucket) = self.buckets.get_mut(&frequency) {
            bucket.remove(&tick);
            if bucket.is_empty() {
                self.buckets.remove(&frequency);
            }
        }
    }

    /// Moves a key from bucket f to bucket f + 1
    fn touch(&mut self, key: &Value) {
        let tick = self.tick();
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let (frequency, old_tick) = (entry.frequency, entry.tick);
        entry.frequency += 1;
        entry.tick = tick;

        self.detach(frequency, old_tick);
        if frequency == self.min_frequency && !self.buckets.contains_key(&frequency) {
            self.min_frequency = frequency + 1;
        }
        self.buckets
            .entry(frequency + 1)
            .or_default()
            .insert(tick, key.clone());
    }

    /// Inserts a key at frequency one, evicting first when full
    fn admit(&mut self, key: Value, row: RowId) -> Admission {
        if self.capacity == 0 {
            return Admission::Refused;
        }
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.row = row;
            return Admission::Refreshed;
        }

        let evicted = if self.is_full() { self.evict() } else { None };
        let tick = self.tick();
        self.buckets.entry(1).or_default().insert(tick, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                row,
                frequency: 1,
                tick,
            },
        );
        self.min_frequency = 1;
        Admission::Admitted(evicted)
    }

    /// Drops the longest-resident key at the minimum frequency
    fn evict(&mut self) -> Option<(Value, u64)> {
        let frequency = if self.buckets.contains_key(&self.min_frequency) {
            self.min_frequency
        } else {
            *self.buckets.keys().next()?
        };
        let bucket = self.buckets.get_mut(&frequency)?;
        let (_, key) = bucket.pop_first()?;
        if bucket.is_empty() {
            self.buckets.remove(&frequency);
        }
        self.entries.remove(&key);
        Some((key, frequency))
    }

    /// Invalidates a key
    fn remove(&mut self, key: &Value) {
        let Some(entry) = self.entries.remove(key) else {
            return;
        };
        self.detach(entry.frequency, entry.tick);
        self.min_frequency = self.buckets.keys().next().copied().unwrap_or(0);
    }
}

/// Cache-fronted table
#[derive(Debug)]
pub struct LfuTable {
    schema: Schema,
    /// Backing list in insertion order; ids are strictly increasing
    rows: Vec<(RowId, Row)>,
    next_id: RowId,
    /// Live rows per primary key
    key_counts: HashMap<Value, usize>,
    tags: TagCounts,
    cache: LfuCache,
    last_evicted: Option<(Value, u64)>,
    stats: LfuStats,
}

impl LfuTable {
    /// Creates an empty table with the default cache capacity
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, LfuConfig::default())
    }

    /// Creates an empty table with the given cache capacity
    pub fn with_config(schema: Schema, config: LfuConfig) -> Self {
        Self {
            tags: TagCounts::new(schema.len()),
            schema,
            rows: Vec::new(),
            next_id: 0,
            key_counts: HashMap::new(),
            cache: LfuCache::new(config.capacity),
            last_evicted: None,
            stats: LfuStats::default(),
        }
    }

    /// Number of cached keys
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache capacity
    pub fn capacity(&self) -> usize {
        self.cache.capacity
    }

    /// True when the key is cached
    pub fn is_cached(&self, key: &Value) -> bool {
        self.cache.entries.contains_key(key)
    }

    /// Access frequency of a cached key
    pub fn frequency(&self, key: &Value) -> Option<u64> {
        self.cache.entries.get(key).map(|entry| entry.frequency)
    }

    /// Lowest frequency present in the cache, zero when empty
    pub fn min_frequency(&self) -> u64 {
        self.cache.min_frequency
    }

    /// Most recent eviction with the frequency the key had
    pub fn last_evicted(&self) -> Option<&(Value, u64)> {
        self.last_evicted.as_ref()
    }

    /// Cache counters
    pub fn stats(&self) -> LfuStats {
        self.stats
    }

    fn position(&self, id: RowId) -> Option<usize> {
        self.rows.binary_search_by_key(&id, |(id, _)| *id).ok()
    }

    fn admit(&mut self, key: Value, id: RowId) {
        let Admission::Admitted(evicted) = self.cache.admit(key, id) else {
            return;
        };
        if let Some((evicted, frequency)) = evicted {
            self.stats.evictions += 1;
            debug!(key = %evicted, frequency, "evicted cache entry");
            self.last_evicted = Some((evicted, frequency));
        }
        self.stats.admissions += 1;
    }

    fn count_key(&mut self, key: &Value) -> usize {
        let count = self.key_counts.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    fn uncount_key(&mut self, key: &Value) {
        if let Some(count) = self.key_counts.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.key_counts.remove(key);
            }
        }
    }

    fn scan(&self, filter: &Filter) -> Result<Vec<usize>> {
        let mut hits = Vec::new();
        for (pos, (_, row)) in self.rows.iter().enumerate() {
            if filter.matches(row)? {
                hits.push(pos);
            }
        }
        Ok(hits)
    }

    /// Matching backing positions, ascending
    fn matching(&mut self, filter: &Filter) -> Result<Vec<usize>> {
        let Some(key) = filter.key_lookup() else {
            return self.scan(filter);
        };
        if self.key_counts.get(key) != Some(&1) {
            return self.scan(filter);
        }
        self.tags.check(filter)?;

        if let Some(pos) = self.cache.get(key).and_then(|id| self.position(id)) {
            self.stats.hits += 1;
            trace!(%key, "cache hit");
            if !filter.matches(&self.rows[pos].1)? {
                return Ok(Vec::new());
            }
            self.cache.touch(key);
            return Ok(vec![pos]);
        }

        self.stats.misses += 1;
        trace!(%key, "cache miss");
        let hits = self.scan(filter)?;
        if let Some(&pos) = hits.first() {
            let id = self.rows[pos].0;
            self.admit(key.clone(), id);
        }
        Ok(hits)
    }
}

impl Table for LfuTable {
    fn kind(&self) -> TableKind {
        TableKind::Lfu
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        let id = self.next_id;
        self.next_id += 1;

        if let Some(key) = row.primary_key().cloned() {
            if self.count_key(&key) == 1 {
                // A fresh key may only push out a key nobody has re-read
                if !self.cache.is_full() || self.cache.min_frequency <= 1 {
                    self.admit(key, id);
                }
            } else {
                self.cache.remove(&key);
            }
        }
        self.tags.add(&row);
        self.rows.push((id, row));
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        Ok(hits
            .into_iter()
            .map(|pos| self.schema.record(&self.rows[pos].1))
            .collect())
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &pos in &hits {
            let old = self.rows[pos].1.set(column, cell.clone());
            self.tags.replace(column, &old, &cell);
            if column != 0 || old == cell {
                continue;
            }
            if let Some(old) = old {
                self.uncount_key(&old);
                self.cache.remove(&old);
            }
            if let Some(new) = &cell {
                if self.count_key(new) > 1 {
                    self.cache.remove(new);
                }
            }
        }
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        for (_, row) in drain_positions(&mut self.rows, &hits) {
            self.tags.remove(&row);
            if let Some(key) = row.primary_key() {
                self.uncount_key(key);
                self.cache.remove(key);
            }
        }
        Ok(hits.len())
    }
}
