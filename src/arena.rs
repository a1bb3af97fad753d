//! Bulk storage for configuration vectors
//!
//! Enumerating a marginal discovers 10⁶–10⁸ short `u32` vectors, all of the same width. Boxing
//! each one separately would drown the distribution in allocator overhead and fragmentation, so
//! configurations are copied into fixed-size blocks instead and addressed by a compact id. Blocks
//! are only ever appended — an issued [`ConfId`] stays valid, and its contents stay unchanged,
//! for the whole lifetime of the arena.

use std::hash::BuildHasher;

// External Crate Imports
use ahash::RandomState;
use hashbrown::HashTable;

// Public API ==========================================================================================================

// MISSING: `ConfId` intentionally doesn't implement `Default` — only an arena can issue ids, and
// an id is only meaningful together with the arena that issued it
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ConfId(u32);

pub struct ConfArena {
    width: usize,
    confs_per_block: usize,
    blocks: Vec<Box<[u32]>>,
    len: usize,
}

impl ConfArena {
    /// An empty arena for configurations of `width` isotopes, allocating `confs_per_block` slots
    /// at a time.
    pub fn new(width: usize, confs_per_block: usize) -> Self {
        Self {
            width,
            confs_per_block: confs_per_block.max(1),
            blocks: Vec::new(),
            len: 0,
        }
    }

    /// Copy `conf` into the arena, returning a stable id for it.
    pub fn push(&mut self, conf: &[u32]) -> ConfId {
        debug_assert_eq!(conf.len(), self.width);

        let block = self.len / self.confs_per_block;
        let slot = self.len % self.confs_per_block;
        if block == self.blocks.len() {
            self.blocks
                .push(vec![0; self.width * self.confs_per_block].into_boxed_slice());
        }

        let start = slot * self.width;
        self.blocks[block][start..start + self.width].copy_from_slice(conf);

        // NOTE: 2³² configurations of width ≥ 2 would already need > 32 GiB of slot storage, so
        // this cast cannot wrap before memory is exhausted
        let id = ConfId(self.len as u32);
        self.len += 1;
        id
    }

    #[must_use]
    pub fn get(&self, id: ConfId) -> &[u32] {
        let idx = id.0 as usize;
        let start = (idx % self.confs_per_block) * self.width;
        &self.blocks[idx / self.confs_per_block][start..start + self.width]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// Content-Keyed Visited Set ===========================================================================================

/// A set of configurations, stored as ids into a [`ConfArena`] but hashed and compared by the
/// slot *contents*, so membership of a scratch buffer can be tested before committing it to the
/// arena.
///
/// Every `ConfSet` draws a fresh random hash salt, so collision patterns never repeat across
/// marginals or runs. Nothing downstream observes iteration order, which keeps enumeration
/// deterministic regardless of the salt.
pub struct ConfSet {
    table: HashTable<ConfId>,
    hasher: RandomState,
}

impl ConfSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hasher: RandomState::new(),
        }
    }

    #[must_use]
    pub fn contains(&self, arena: &ConfArena, conf: &[u32]) -> bool {
        let hash = self.hasher.hash_one(conf);
        self.table
            .find(hash, |&id| arena.get(id) == conf)
            .is_some()
    }

    /// Mark the configuration already stored at `id` as visited.
    ///
    /// Callers guarantee `id` was issued by `arena` and that its contents aren't yet in the set.
    pub fn insert(&mut self, arena: &ConfArena, id: ConfId) {
        let hasher = &self.hasher;
        let hash = hasher.hash_one(arena.get(id));
        self.table
            .insert_unique(hash, id, |&existing| hasher.hash_one(arena.get(existing)));
    }
}

// Module Tests ========================================================================================================
