//! # ShelfDB Storage Strategies
//!
//! Seven interchangeable in-memory table layouts behind one contract.
//!
//! ## Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of ShelfDB.**
//!
//! Users should depend on the main `shelfdb` crate instead, which provides
//! the stable public API. This crate's API may change without notice
//! between minor versions.
//!
//! ---
//!
//! Every strategy implements [`shelfdb_core::Table`] and returns the same
//! rows for the same calls. What differs is the layout and therefore the
//! cost profile:
//!
//! - **BackwardsStack**: LIFO vector, scanned newest-first
//! - **LeakyBucket**: bounded main buffer leaking old rows into overflow
//! - **PingPong**: hot/cold lists with decaying access counters
//! - **RandomQueue**: round-robin sharded FIFO queues with rebalancing
//! - **ForestMap**: one sorted index per column over a row arena
//! - **Chunk**: fixed-size chunks, validity bitmaps and a key index
//! - **LFU**: frequency-ranked key cache over a backing list
//!
//! ```text
//!              Table (insert / select / update / delete)
//!                               |
//!   +-------+-------+-------+---+---+-------+-------+
//!   |       |       |       |       |       |       |
//! stack  leaky  pingpong  queues  forest  chunk    lfu
//! ```
//!
//! Maintenance work (leaks, promotions, compaction, rebalancing, eviction)
//! always runs synchronously inside the call that triggers it.

use shelfdb_core::{Schema, Table, TableKind};

pub mod backwards_stack;
pub mod chunk;
pub mod forest_map;
pub mod leaky_bucket;
pub mod lfu;
pub mod ping_pong;
pub mod random_queue;
mod tags;

pub use backwards_stack::BackwardsStack;
pub use chunk::{ChunkConfig, ChunkStats, ChunkTable};
pub use forest_map::ForestMap;
pub use leaky_bucket::{LeakyBucket, LeakyBucketConfig, LeakyBucketStats};
pub use lfu::{LfuConfig, LfuStats, LfuTable};
pub use ping_pong::{PingPong, PingPongConfig, PingPongStats};
pub use random_queue::{RandomQueue, RandomQueueConfig, RandomQueueStats};

/// Tuning knobs for every strategy
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// LeakyBucket capacities and thresholds
    pub leaky_bucket: LeakyBucketConfig,
    /// PingPong hot threshold and rebalance interval
    pub ping_pong: PingPongConfig,
    /// RandomQueue shard count and rebalance triggers
    pub random_queue: RandomQueueConfig,
    /// Chunk size
    pub chunk: ChunkConfig,
    /// LFU cache capacity
    pub lfu: LfuConfig,
}

impl StorageConfig {
    /// Replace the LeakyBucket configuration
    pub fn with_leaky_bucket(mut self, config: LeakyBucketConfig) -> Self {
        self.leaky_bucket = config;
        self
    }

    /// Replace the PingPong configuration
    pub fn with_ping_pong(mut self, config: PingPongConfig) -> Self {
        self.ping_pong = config;
        self
    }

    /// Replace the RandomQueue configuration
    pub fn with_random_queue(mut self, config: RandomQueueConfig) -> Self {
        self.random_queue = config;
        self
    }

    /// Replace the Chunk configuration
    pub fn with_chunk(mut self, config: ChunkConfig) -> Self {
        self.chunk = config;
        self
    }

    /// Replace the LFU configuration
    pub fn with_lfu(mut self, config: LfuConfig) -> Self {
        self.lfu = config;
        self
    }
}

/// Creates an empty table of the given kind
pub fn open_table(kind: TableKind, schema: Schema, config: &StorageConfig) -> Box<dyn Table> {
    match kind {
        TableKind::BackwardsStack => Box::new(BackwardsStack::new(schema)),
        TableKind::LeakyBucket => Box::new(LeakyBucket::with_config(
            schema,
            config.leaky_bucket.clone(),
        )),
        TableKind::PingPong => Box::new(PingPong::with_config(schema, config.ping_pong.clone())),
        TableKind::RandomQueue => Box::new(RandomQueue::with_config(
            schema,
            config.random_queue.clone(),
        )),
        TableKind::ForestMap => Box::new(ForestMap::new(schema)),
        TableKind::Chunk => Box::new(ChunkTable::with_config(schema, config.chunk.clone())),
        TableKind::Lfu => Box::new(LfuTable::with_config(schema, config.lfu.clone())),
    }
}

/// Removes the items at `positions` (ascending) and returns them in order.
/// Survivors keep their relative order.
pub(crate) fn drain_positions<T>(items: &mut Vec<T>, positions: &[usize]) -> Vec<T> {
    if positions.is_empty() {
        return Vec::new();
    }
    let mut taken = Vec::with_capacity(positions.len());
    let mut kept = Vec::with_capacity(items.len().saturating_sub(positions.len()));
    let mut next = positions.iter().copied().peekable();
    for (i, item) in items.drain(..).enumerate() {
        if next.peek() == Some(&i) {
            next.next();
            taken.push(item);
        } else {
            kept.push(item);
        }
    }
    *items = kept;
    taken
}
