/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The interface the library user's key-value store needs to implement to back the world state
//! view and the block store.
//!
//! The pipeline never writes through this seam incrementally: all mutations accumulate in
//! [write sets](crate::state::write_set::WriteSet) and reach the store only as a single atomic
//! [`WriteBatch`] when a [`MutableStorage`](crate::state::mutable_storage::MutableStorage) is
//! committed. A store implementation therefore only needs atomicity at the granularity of one
//! `write` call.

use std::fmt::{self, Display, Formatter};

/// A handle to the underlying persistent key-value store.
///
/// Handles are cheap to clone and clones observe the same underlying data; each
/// `MutableStorage` takes its own clone and reads committed state through it.
pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;
    type Snapshot<'a>: 'a + KVGet;

    /// Atomically apply `wb` to the store.
    fn write(&mut self, wb: Self::WriteBatch);

    /// Remove every key from the store.
    fn clear(&mut self);

    /// Get a consistent point-in-time view of the store.
    fn snapshot<'b>(&'b self) -> Self::Snapshot<'b>;
}

/// A readable view of the store: the store itself, or one of its snapshots.
pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// An ordered accumulation of set/delete operations applied atomically by
/// [`KVStore::write`].
pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// Error raised when ledger state cannot be read, decoded, or opened for mutation.
#[derive(Debug)]
pub enum StorageError {
    /// A value expected at a known key path was missing.
    ValueExpectedButNotFound { key: KeyClass },

    /// A stored value failed to deserialize.
    DeserializeValueError {
        key: KeyClass,
        source: std::io::Error,
    },

    /// A mutable storage could not be opened over the store.
    Unavailable { reason: String },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ValueExpectedButNotFound { key } => {
                write!(f, "value expected but not found at key class {:?}", key)
            }
            StorageError::DeserializeValueError { key, source } => {
                write!(f, "could not deserialize value at key class {:?}: {}", key, source)
            }
            StorageError::Unavailable { reason } => {
                write!(f, "storage unavailable: {}", reason)
            }
        }
    }
}

/// The class of key a [`StorageError`] refers to, mirroring the key space laid out in
/// [`paths`](crate::state::paths).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyClass {
    Account,
    Signatories,
    Grants,
    Balance,
    Domain,
    Asset,
    Role,
    Peers,
    Block,
    BlockAtHeight,
    TopHash,
    ChainHeight,
}
