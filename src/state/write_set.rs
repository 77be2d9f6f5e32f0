/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A set of key-value updates that have not yet reached the underlying store.
//!
//! `WriteSet` is the unit the savepoint mechanism is built on: every open savepoint is one
//! `WriteSet` overlay, reads resolve newest-overlay-first, releasing a savepoint merges its
//! overlay into the one below, and rolling back simply drops it.

use std::collections::{hash_map, hash_set, HashMap, HashSet};

use crate::state::kv_store::WriteBatch;

/// Accumulated insertions and deletions, keyed by raw store keys.
///
/// A key appears in at most one of the two halves: inserting cancels a pending deletion of the
/// same key and vice versa.
#[derive(Clone, Debug, Default)]
pub struct WriteSet {
    inserts: HashMap<Vec<u8>, Vec<u8>>,
    deletes: HashSet<Vec<u8>>,
}

impl WriteSet {
    /// Create a new `WriteSet` with empty inserts and deletes.
    pub fn new() -> Self {
        Self {
            inserts: HashMap::new(),
            deletes: HashSet::new(),
        }
    }

    /// Schedule the insertion of a `key`-`value` pair, cancelling any pending deletion of `key`.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.deletes.remove(&key);
        self.inserts.insert(key, value);
    }

    /// Schedule the deletion of `key`, cancelling any pending insertion of `key`.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.inserts.remove(&key);
        self.deletes.insert(key);
    }

    /// Get the value this `WriteSet` schedules for insertion at `key`, if any.
    pub fn get_insert(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.inserts.get(key)
    }

    /// Check whether this `WriteSet` schedules the deletion of `key`.
    pub fn contains_delete(&self, key: &[u8]) -> bool {
        self.deletes.contains(key)
    }

    /// Check whether this `WriteSet` schedules no updates at all.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// Lay `overlay` on top of this `WriteSet`: every update in `overlay` wins over an update to
    /// the same key in `self`.
    pub fn merge(&mut self, overlay: WriteSet) {
        for (key, value) in overlay.inserts {
            self.set(key, value);
        }
        for key in overlay.deletes {
            self.delete(key);
        }
    }

    /// Copy every update in this `WriteSet` into a store write batch.
    pub fn apply_to<W: WriteBatch>(&self, wb: &mut W) {
        for (key, value) in &self.inserts {
            wb.set(key, value);
        }
        for key in &self.deletes {
            wb.delete(key);
        }
    }

    /// Get an iterator over the key-value pairs this `WriteSet` will insert.
    pub fn inserts(&self) -> hash_map::Iter<Vec<u8>, Vec<u8>> {
        self.inserts.iter()
    }

    /// Get an iterator over the keys this `WriteSet` will delete.
    pub fn deletes(&self) -> hash_set::Iter<Vec<u8>> {
        self.deletes.iter()
    }
}
