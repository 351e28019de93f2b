//! Chunk - fixed-size chunks with a primary key index
//!
//! Rows are appended to the last chunk; a new chunk opens when it fills.
//! Each chunk keeps a dense row array, a validity bitmap and a deleted
//! count. Deleting clears the validity bit (a tombstone) and a chunk whose
//! tombstones exceed a third of its slots is compacted in place.
//!
//! ```text
//! chunk 0: [r0][r1][ x][r3]   valid 1101  deleted 1
//! chunk 1: [r4][r5]           valid 11    deleted 0
//!
//! index: key(r3) -> (0, 3), key(r4) -> (1, 0), ...
//! ```
//!
//! The index maps a primary key to its slots. Lists made of a single AND
//! group containing `pk = literal` are answered from it; everything else is
//! a full scan, which also re-files any live row the index is missing.
//! Per-column tag counts let a key lookup fail with the same type error a
//! scan would raise.
//!
//! Inserting a key that already exists tombstones the old row first.

use crate::tags::TagCounts;
use serde::Serialize;
use shelfdb_core::{
    parse_cell, Condition, Filter, Record, Result, Row, Schema, Table, TableKind, Value,
};
use std::collections::HashMap;
use tracing::debug;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Rows per chunk
    pub chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 128 }
    }
}

/// Maintenance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkStats {
    /// Chunk compactions
    pub compactions: u64,
    /// Index entries re-filed during full scans
    pub index_repairs: u64,
    /// Operations answered from the key index
    pub index_hits: u64,
    /// Inserts that replaced an existing key
    pub overwrites: u64,
}

/// Position of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    chunk: usize,
    offset: usize,
}

/// Fixed-width bitmap of live slots
#[derive(Debug, Clone, Default)]
struct Validity {
    words: Vec<u64>,
}

impl Validity {
    fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    fn set(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    fn clear(&mut self, bit: usize) {
        if let Some(word) = self.words.get_mut(bit / 64) {
            *word &= !(1 << (bit % 64));
        }
    }

    fn get(&self, bit: usize) -> bool {
        self.words
            .get(bit / 64)
            .is_some_and(|word| word & (1 << (bit % 64)) != 0)
    }

    fn reset(&mut self, live: usize) {
        self.words.iter_mut().for_each(|word| *word = 0);
        for bit in 0..live {
            self.set(bit);
        }
    }
}

#[derive(Debug)]
struct Chunk {
    rows: Vec<Row>,
    valid: Validity,
    deleted: usize,
}

impl Chunk {
    fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            valid: Validity::with_capacity(capacity),
            deleted: 0,
        }
    }

    fn push(&mut self, row: Row) -> usize {
        let offset = self.rows.len();
        self.rows.push(row);
        self.valid.set(offset);
        offset
    }

    fn row(&self, offset: usize) -> Option<&Row> {
        if self.valid.get(offset) {
            self.rows.get(offset)
        } else {
            None
        }
    }

    fn row_mut(&mut self, offset: usize) -> Option<&mut Row> {
        if self.valid.get(offset) {
            self.rows.get_mut(offset)
        } else {
            None
        }
    }

    /// Clears a slot and hands back its row
    fn tombstone(&mut self, offset: usize) -> Option<Row> {
        if !self.valid.get(offset) {
            return None;
        }
        self.valid.clear(offset);
        self.deleted += 1;
        self.rows.get_mut(offset).map(std::mem::take)
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(offset, _)| self.valid.get(*offset))
    }

    fn needs_compaction(&self) -> bool {
        self.deleted * 3 > self.rows.len()
    }

    /// Drops tombstones and returns every (old, new) offset move, ascending
    fn compact(&mut self) -> Vec<(usize, usize)> {
        let mut moves = Vec::new();
        let mut kept = Vec::with_capacity(self.rows.len() - self.deleted);
        for (offset, row) in std::mem::take(&mut self.rows).into_iter().enumerate() {
            if self.valid.get(offset) {
                if offset != kept.len() {
                    moves.push((offset, kept.len()));
                }
                kept.push(row);
            }
        }
        self.valid.reset(kept.len());
        self.rows = kept;
        self.deleted = 0;
        moves
    }
}

/// Chunked table with a primary key index
#[derive(Debug)]
pub struct ChunkTable {
    schema: Schema,
    config: ChunkConfig,
    chunks: Vec<Chunk>,
    index: HashMap<Value, Vec<Slot>>,
    tags: TagCounts,
    live: usize,
    stats: ChunkStats,
}

impl ChunkTable {
    /// Creates an empty table with the default chunk size
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, ChunkConfig::default())
    }

    /// Creates an empty table. A chunk size of zero is treated as one.
    pub fn with_config(schema: Schema, mut config: ChunkConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        Self {
            tags: TagCounts::new(schema.len()),
            schema,
            config,
            chunks: Vec::new(),
            index: HashMap::new(),
            live: 0,
            stats: ChunkStats::default(),
        }
    }

    /// Number of chunks opened so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Tombstone count of every chunk
    pub fn tombstones(&self) -> Vec<usize> {
        self.chunks.iter().map(|chunk| chunk.deleted).collect()
    }

    /// Maintenance counters
    pub fn stats(&self) -> ChunkStats {
        self.stats
    }

    fn row(&self, slot: Slot) -> Option<&Row> {
        self.chunks.get(slot.chunk)?.row(slot.offset)
    }

    fn file(&mut self, key: Value, slot: Slot) {
        self.index.entry(key).or_default().push(slot);
    }

    fn unfile(&mut self, key: &Value, slot: Slot) {
        if let Some(slots) = self.index.get_mut(key) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.index.remove(key);
            }
        }
    }

    fn append(&mut self, row: Row) -> Slot {
        let full = self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.rows.len() >= self.config.chunk_size);
        if full {
            self.chunks.push(Chunk::new(self.config.chunk_size));
        }
        let chunk = self.chunks.len() - 1;
        let offset = self.chunks[chunk].push(row);
        Slot { chunk, offset }
    }

    /// Tombstones one slot and drops its index entry
    fn remove(&mut self, slot: Slot) -> bool {
        let Some(row) = self
            .chunks
            .get_mut(slot.chunk)
            .and_then(|chunk| chunk.tombstone(slot.offset))
        else {
            return false;
        };
        if let Some(key) = row.primary_key() {
            self.unfile(key, slot);
        }
        self.tags.remove(&row);
        self.live -= 1;
        true
    }

    /// Compacts the chunk if its tombstone ratio is over the limit and
    /// rewrites the index entry of every row that moved
    fn compact_if_needed(&mut self, chunk: usize) {
        let Some(target) = self.chunks.get_mut(chunk) else {
            return;
        };
        if !target.needs_compaction() {
            return;
        }
        let dropped = target.deleted;
        let moves = target.compact();

        for &(old, new) in &moves {
            let Some(key) = self.chunks[chunk].rows[new].primary_key() else {
                continue;
            };
            if let Some(slots) = self.index.get_mut(key) {
                for slot in slots.iter_mut() {
                    if *slot == (Slot { chunk, offset: old }) {
                        slot.offset = new;
                    }
                }
            }
        }

        self.stats.compactions += 1;
        debug!(chunk, tombstones = dropped, moved = moves.len(), "compacted chunk");
    }

    /// Matching slots in storage order.
    ///
    /// Key lookups read only the indexed slots. Full scans collect live rows
    /// missing from the index and re-file them once the scan has succeeded.
    fn matching(&mut self, filter: &Filter) -> Result<Vec<Slot>> {
        if let Some(key) = filter.key_lookup() {
            self.tags.check(filter)?;
            let mut candidates = self.index.get(key).cloned().unwrap_or_default();
            candidates.sort();
            let mut hits = Vec::with_capacity(candidates.len());
            for slot in candidates {
                if let Some(row) = self.row(slot) {
                    if filter.matches(row)? {
                        hits.push(slot);
                    }
                }
            }
            self.stats.index_hits += 1;
            return Ok(hits);
        }

        let mut hits = Vec::new();
        let mut missing = Vec::new();
        for (c, chunk) in self.chunks.iter().enumerate() {
            for (offset, row) in chunk.live() {
                let slot = Slot { chunk: c, offset };
                if let Some(key) = row.primary_key() {
                    let filed = self
                        .index
                        .get(key)
                        .is_some_and(|slots| slots.contains(&slot));
                    if !filed {
                        missing.push((key.clone(), slot));
                    }
                }
                if filter.matches(row)? {
                    hits.push(slot);
                }
            }
        }

        if !missing.is_empty() {
            self.stats.index_repairs += missing.len() as u64;
            debug!(entries = missing.len(), "repaired key index during scan");
            for (key, slot) in missing {
                self.file(key, slot);
            }
        }
        Ok(hits)
    }
}

impl Table for ChunkTable {
    fn kind(&self) -> TableKind {
        TableKind::Chunk
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.live
    }

    fn insert(&mut self, values: &[&str]) -> Result<()> {
        let row = self.schema.parse_row(values)?;
        let key = row.primary_key().cloned();

        if let Some(existing) = key.as_ref().and_then(|k| self.index.get(k)).cloned() {
            let chunks: Vec<usize> = existing.iter().map(|slot| slot.chunk).collect();
            for slot in existing {
                self.remove(slot);
            }
            for chunk in chunks {
                self.compact_if_needed(chunk);
            }
            self.stats.overwrites += 1;
        }

        self.tags.add(&row);
        let slot = self.append(row);
        if let Some(key) = key {
            self.file(key, slot);
        }
        self.live += 1;
        Ok(())
    }

    fn select(&mut self, conditions: &[Condition]) -> Result<Vec<Record>> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;
        Ok(hits
            .into_iter()
            .filter_map(|slot| self.row(slot))
            .map(|row| self.schema.record(row))
            .collect())
    }

    fn update(&mut self, column: &str, value: &str, conditions: &[Condition]) -> Result<usize> {
        let column = self.schema.require(column)?;
        let filter = Filter::compile(&self.schema, conditions)?;
        let cell = parse_cell(value);

        let hits = self.matching(&filter)?;
        for &slot in &hits {
            let Some(row) = self.chunks[slot.chunk].row_mut(slot.offset) else {
                continue;
            };
            let old = row.set(column, cell.clone());
            self.tags.replace(column, &old, &cell);
            if column == 0 && old != cell {
                if let Some(old) = old {
                    self.unfile(&old, slot);
                }
                if let Some(new) = cell.clone() {
                    self.file(new, slot);
                }
            }
        }
        Ok(hits.len())
    }

    fn delete(&mut self, conditions: &[Condition]) -> Result<usize> {
        let filter = Filter::compile(&self.schema, conditions)?;
        let hits = self.matching(&filter)?;

        let mut touched = Vec::new();
        for &slot in &hits {
            if self.remove(slot) && touched.last() != Some(&slot.chunk) {
                touched.push(slot.chunk);
            }
        }
        for chunk in touched {
            self.compact_if_needed(chunk);
        }
        Ok(hits.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfdb_core::{Error, Operator, ValueKind};

    fn table(chunk_size: usize, rows: usize) -> ChunkTable {
        let schema = Schema::new(["id", "name"]).unwrap();
        let mut table = ChunkTable::with_config(schema, ChunkConfig { chunk_size });
        for i in 0..rows {
            let id = i.to_string();
            let name = format!("row{}", i);
            table.insert(&[id.as_str(), name.as_str()]).unwrap();
        }
        table
    }

    fn by_key(table: &mut ChunkTable, key: usize) -> Vec<Record> {
        table
            .select(&[Condition::new("id", Operator::Eq, &key.to_string())])
            .unwrap()
    }

    #[test]
    fn test_validity_bitmap() {
        let mut valid = Validity::with_capacity(70);
        assert_eq!(valid.words.len(), 2);
        valid.set(3);
        valid.set(65);
        assert!(valid.get(3) && valid.get(65));
        valid.clear(3);
        assert!(!valid.get(3));
        assert!(!valid.get(500));
    }

    #[test]
    fn test_chunks_fill_in_order() {
        let table = table(4, 10);
        assert_eq!(table.chunk_count(), 3);
        assert_eq!(table.len(), 10);
        assert_eq!(table.tombstones(), vec![0, 0, 0]);
    }

    #[test]
    fn test_key_lookup_uses_index() {
        let mut table = table(4, 10);
        let rows = by_key(&mut table, 6);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some("row6"));
        assert_eq!(table.stats().index_hits, 1);

        // A disjunction cannot be served from the index
        table
            .select(&[
                Condition::new("id", Operator::Eq, "6"),
                Condition::or("id", Operator::Eq, "7"),
            ])
            .unwrap();
        assert_eq!(table.stats().index_hits, 1);
    }

    #[test]
    fn test_duplicate_key_overwrites() {
        let mut table = table(4, 3);
        table.insert(&["1", "replacement"]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.stats().overwrites, 1);

        let rows = by_key(&mut table, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some("replacement"));
    }

    #[test]
    fn test_compaction_rewrites_index() {
        let mut table = table(6, 6);
        let removed = table
            .delete(&[
                Condition::new("id", Operator::Eq, "0"),
                Condition::or("id", Operator::Eq, "2"),
                Condition::or("id", Operator::Eq, "3"),
            ])
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(table.stats().compactions, 1);
        assert_eq!(table.tombstones(), vec![0]);

        for key in [1, 4, 5] {
            let rows = by_key(&mut table, key);
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get("name"), Some(format!("row{}", key).as_str()));
        }
        assert_eq!(table.index[&Value::Integer(5)], vec![Slot { chunk: 0, offset: 2 }]);
    }

    #[test]
    fn test_ratio_below_limit_keeps_tombstones() {
        let mut table = table(6, 6);
        table.delete(&[Condition::new("id", Operator::Le, "1")]).unwrap();
        assert_eq!(table.tombstones(), vec![2]);
        assert_eq!(table.stats().compactions, 0);
        assert_eq!(table.select(&[]).unwrap().len(), 4);
    }

    #[test]
    fn test_pk_update_moves_index_entry() {
        let mut table = table(4, 5);
        table
            .update("id", "40", &[Condition::new("id", Operator::Eq, "4")])
            .unwrap();
        assert!(by_key(&mut table, 4).is_empty());
        assert_eq!(by_key(&mut table, 40)[0].get("name"), Some("row4"));
    }

    #[test]
    fn test_key_lookup_raises_scan_type_errors() {
        let mut table = table(4, 3);
        table.insert(&["8", "9"]).unwrap();
        let lookup = |key: &str| {
            vec![
                Condition::new("id", Operator::Eq, key),
                Condition::and("name", Operator::Gt, "row0"),
            ]
        };
        let mismatch = Err(Error::TypeMismatch {
            left: ValueKind::Integer,
            right: ValueKind::Text,
        });

        assert_eq!(table.select(&lookup("1")).map(|rows| rows.len()), mismatch);
        assert_eq!(table.select(&lookup("999")).map(|rows| rows.len()), mismatch);
        assert_eq!(table.delete(&lookup("1")), mismatch);
        assert_eq!(table.len(), 4);
        assert_eq!(table.stats().index_hits, 0);

        // Once the odd row is renamed the lookup is served again
        table
            .update("name", "row8", &[Condition::new("id", Operator::Eq, "8")])
            .unwrap();
        assert_eq!(table.select(&lookup("1")).unwrap().len(), 1);
        assert_eq!(table.stats().index_hits, 2);
    }

    #[test]
    fn test_scan_repairs_missing_entries() {
        let mut table = table(4, 5);
        table.index.remove(&Value::Integer(2));
        assert!(by_key(&mut table, 2).is_empty());

        let rows = table.select(&[Condition::new("id", Operator::Ge, "2")]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(table.stats().index_repairs, 1);
        assert_eq!(by_key(&mut table, 2).len(), 1);
    }
}
