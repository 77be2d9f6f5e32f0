/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A single-slot cache holding the most recently committed consensus outcome.
//!
//! Empty blocks are never persisted, and even occupied blocks may be requested by peers before
//! the commit reaches disk, so the newest outcome is kept here for the block server to hand out.
//! The slot holds at most one variant: a new insert displaces the previous one.

use std::sync::Mutex;

use crate::types::block::BlockVariant;

pub struct ConsensusBlockCache {
    slot: Mutex<Option<BlockVariant>>,
}

impl ConsensusBlockCache {
    pub fn new() -> ConsensusBlockCache {
        ConsensusBlockCache {
            slot: Mutex::new(None),
        }
    }

    /// Place `variant` in the cache, displacing whatever was there.
    pub fn insert(&self, variant: BlockVariant) {
        *self.slot.lock().unwrap() = Some(variant);
    }

    /// Get a clone of the cached variant, if any. The slot stays occupied.
    pub fn get(&self) -> Option<BlockVariant> {
        self.slot.lock().unwrap().clone()
    }

    /// Empty the cache.
    pub fn release(&self) {
        *self.slot.lock().unwrap() = None;
    }
}

impl Default for ConsensusBlockCache {
    fn default() -> Self {
        ConsensusBlockCache::new()
    }
}
