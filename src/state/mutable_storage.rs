/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Mutable storage: the only write path into the ledger.
//!
//! A [`MutableStorage`] is an uncommitted extension of the chain. Blocks are applied to it with
//! block-level all-or-nothing semantics (a savepoint wraps each block, and any failing transaction
//! rolls the whole block back), and the accumulated writes reach the committed store in a single
//! [`KVStore::write`] when the storage is passed to [`MutableFactory::commit`]. Dropping a
//! `MutableStorage` on any other path discards everything, so a crash mid-apply can never leave a
//! half-applied block behind.
//!
//! [`Storage`] is the canonical factory over a [`KVStore`]: it owns the committed chain metadata
//! (top hash, height, block records) and hands out fresh `MutableStorage`s positioned at the
//! current top.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::commands::{execute, validate, CommandError};
use crate::state::kv_store::{KVStore, KeyClass, StorageError, WriteBatch};
use crate::state::paths;
use crate::state::write_set::WriteSet;
use crate::state::wsv::WorldStateView;
use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::Block;
use crate::types::transaction::Transaction;

/// An uncommitted extension of the chain: a world state view plus the blocks that produced it.
pub struct MutableStorage<S: KVStore> {
    wsv: WorldStateView<S>,
    top_hash: CryptoHash,
    height: BlockHeight,
    pending_blocks: Vec<Arc<Block>>,
}

impl<S: KVStore> MutableStorage<S> {
    fn new(base: S, top_hash: CryptoHash, height: BlockHeight) -> MutableStorage<S> {
        MutableStorage {
            wsv: WorldStateView::new(base),
            top_hash,
            height,
            pending_blocks: Vec::new(),
        }
    }

    /// Get the hash of the newest block applied to this storage (or of the committed top, if no
    /// block has been applied yet).
    pub fn top_hash(&self) -> &CryptoHash {
        &self.top_hash
    }

    /// Get the chain height including the blocks applied to this storage.
    pub fn height(&self) -> BlockHeight {
        self.height
    }

    /// Get the world state view as extended by the blocks applied so far.
    pub fn wsv(&self) -> &WorldStateView<S> {
        &self.wsv
    }

    /// Apply `block` on top of this storage's current state.
    ///
    /// `extra_check` is the caller's structural predicate. It is evaluated against the block, the
    /// current world state view, and the current top hash before any transaction runs; returning
    /// false rejects the block without touching state.
    ///
    /// The block is applied under a savepoint: either every transaction validates and executes,
    /// or the storage is left exactly as it was.
    pub fn apply_block(
        &mut self,
        block: &Arc<Block>,
        extra_check: impl FnOnce(&Block, &WorldStateView<S>, &CryptoHash) -> bool,
    ) -> Result<(), BlockApplyError> {
        if !extra_check(block, &self.wsv, &self.top_hash) {
            return Err(BlockApplyError::ExtraCheckFailed {
                block: block.hash,
            });
        }

        self.wsv.open_savepoint();
        for (tx_index, transaction) in block.transactions.iter().enumerate() {
            match self.apply_transaction(transaction) {
                Ok(Ok(())) => continue,
                Ok(Err(failure)) => {
                    self.wsv.rollback_savepoint();
                    return Err(BlockApplyError::TransactionFailed {
                        block: block.hash,
                        tx_index,
                        tx_hash: transaction.hash,
                        failure,
                    });
                }
                Err(storage_error) => {
                    self.wsv.rollback_savepoint();
                    return Err(BlockApplyError::Storage(storage_error));
                }
            }
        }
        self.wsv.release_savepoint();

        self.top_hash = block.hash;
        self.height = block.height;
        self.pending_blocks.push(block.clone());
        Ok(())
    }

    /// Validate and execute every command of `transaction` under its own savepoint.
    ///
    /// The outer result reports storage-level failures; the inner result carries the domain
    /// rejection if a command could not be validated or executed. Every failing return, storage
    /// or domain, rolls the transaction's savepoint back first, so the savepoint stack is left
    /// exactly as it was on entry.
    pub fn apply_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<Result<(), CommandFailure>, StorageError> {
        self.wsv.open_savepoint();
        for (command_index, command) in transaction.commands.iter().enumerate() {
            let validated = match validate::validate(&self.wsv, &transaction.creator, command) {
                Ok(validated) => validated,
                Err(storage_error) => {
                    self.wsv.rollback_savepoint();
                    return Err(storage_error);
                }
            };
            if let Err(error) = validated {
                self.wsv.rollback_savepoint();
                return Ok(Err(CommandFailure {
                    command_index,
                    command_kind: command.kind(),
                    stage: FailureStage::Validation,
                    error,
                }));
            }
            let executed = match execute::execute(&mut self.wsv, &transaction.creator, command) {
                Ok(executed) => executed,
                Err(storage_error) => {
                    self.wsv.rollback_savepoint();
                    return Err(storage_error);
                }
            };
            if let Err(error) = executed {
                self.wsv.rollback_savepoint();
                return Ok(Err(CommandFailure {
                    command_index,
                    command_kind: command.kind(),
                    stage: FailureStage::Execution,
                    error,
                }));
            }
        }
        self.wsv.release_savepoint();
        Ok(Ok(()))
    }
}

/// The phase in which a command failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureStage {
    Validation,
    Execution,
}

/// A command-level failure, positioned within its transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandFailure {
    pub command_index: usize,
    pub command_kind: &'static str,
    pub stage: FailureStage,
    pub error: CommandError,
}

impl Display for CommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            FailureStage::Validation => "validate",
            FailureStage::Execution => "execute",
        };
        write!(
            f,
            "command {} ({}) failed to {}: {}",
            self.command_index, self.command_kind, stage, self.error
        )
    }
}

/// Reason a block could not be applied to a [`MutableStorage`].
#[derive(Debug)]
pub enum BlockApplyError {
    /// The caller's structural predicate rejected the block.
    ExtraCheckFailed { block: CryptoHash },

    /// A transaction inside the block failed, so the whole block was rolled back.
    TransactionFailed {
        block: CryptoHash,
        tx_index: usize,
        tx_hash: CryptoHash,
        failure: CommandFailure,
    },

    /// The underlying store failed.
    Storage(StorageError),
}

impl From<StorageError> for BlockApplyError {
    fn from(error: StorageError) -> Self {
        BlockApplyError::Storage(error)
    }
}

impl Display for BlockApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BlockApplyError::ExtraCheckFailed { block } => {
                write!(f, "block {} was rejected by the structural check", block)
            }
            BlockApplyError::TransactionFailed {
                block,
                tx_index,
                tx_hash,
                failure,
            } => write!(
                f,
                "block {} rolled back: transaction {} ({}): {}",
                block, tx_index, tx_hash, failure
            ),
            BlockApplyError::Storage(error) => write!(f, "storage failure: {}", error),
        }
    }
}

/// Source of [`MutableStorage`]s and sink for their committed results.
///
/// This is a seam rather than a concrete type so that the synchronizer and its tests can run
/// against a factory whose `create_mutable_storage` is scripted to fail.
pub trait MutableFactory: Send + 'static {
    type Store: KVStore;

    /// Create a fresh `MutableStorage` positioned at the committed top of the chain.
    fn create_mutable_storage(&self) -> Result<MutableStorage<Self::Store>, StorageError>;

    /// Atomically persist everything `storage` accumulated, returning the blocks that became part
    /// of the committed chain.
    fn commit(
        &mut self,
        storage: MutableStorage<Self::Store>,
    ) -> Result<Vec<Arc<Block>>, StorageError>;
}

/// The canonical [`MutableFactory`]: committed chain state over a [`KVStore`].
///
/// Clones share the same underlying store.
pub struct Storage<S: KVStore> {
    store: S,
}

impl<S: KVStore> Clone for Storage<S> {
    fn clone(&self) -> Self {
        Storage {
            store: self.store.clone(),
        }
    }
}

impl<S: KVStore> Storage<S> {
    pub fn new(store: S) -> Storage<S> {
        Storage { store }
    }

    /// Write the chain bootstrap state: the provided initial world state, a genesis top hash, and
    /// height zero. Must be called exactly once, on an empty store.
    pub fn initialize(&mut self, initial_state: WriteSet) {
        let mut batch = S::WriteBatch::new();
        initial_state.apply_to(&mut batch);
        batch.set(
            &paths::TOP_HASH,
            &CryptoHash::genesis().try_to_vec().unwrap(),
        );
        batch.set(
            &paths::CHAIN_HEIGHT,
            &BlockHeight::new(0).try_to_vec().unwrap(),
        );
        self.store.write(batch);
    }

    /// Get the hash of the top committed block (the genesis hash if the chain is empty).
    pub fn top_hash(&self) -> Result<CryptoHash, StorageError> {
        self.get_expected(&paths::TOP_HASH, KeyClass::TopHash)
    }

    /// Get the committed chain height.
    pub fn height(&self) -> Result<BlockHeight, StorageError> {
        self.get_expected(&paths::CHAIN_HEIGHT, KeyClass::ChainHeight)
    }

    /// Get the committed block with the given hash.
    pub fn block(&self, hash: &CryptoHash) -> Result<Option<Arc<Block>>, StorageError> {
        let block: Option<Block> = self.get(&block_key(hash), KeyClass::Block)?;
        Ok(block.map(Arc::new))
    }

    /// Get the committed block at the given height.
    pub fn block_at_height(
        &self,
        height: BlockHeight,
    ) -> Result<Option<Arc<Block>>, StorageError> {
        let hash: Option<CryptoHash> =
            self.get(&block_at_height_key(height), KeyClass::BlockAtHeight)?;
        match hash {
            Some(hash) => self.block(&hash),
            None => Ok(None),
        }
    }

    /// Get every committed block from `from_height` (inclusive) up to the top, in height order.
    pub fn blocks_from_height(
        &self,
        from_height: BlockHeight,
    ) -> Result<Vec<Arc<Block>>, StorageError> {
        let mut blocks = Vec::new();
        let mut height = from_height;
        while let Some(block) = self.block_at_height(height)? {
            blocks.push(block);
            height += 1;
        }
        Ok(blocks)
    }

    fn get<T: BorshDeserialize>(
        &self,
        key: &[u8],
        key_class: KeyClass,
    ) -> Result<Option<T>, StorageError> {
        match self.store.get(key) {
            Some(bytes) => T::deserialize(&mut bytes.as_slice()).map(Some).map_err(|err| {
                StorageError::DeserializeValueError {
                    key: key_class,
                    source: err,
                }
            }),
            None => Ok(None),
        }
    }

    fn get_expected<T: BorshDeserialize>(
        &self,
        key: &[u8],
        key_class: KeyClass,
    ) -> Result<T, StorageError> {
        self.get(key, key_class)?
            .ok_or(StorageError::ValueExpectedButNotFound { key: key_class })
    }
}

impl<S: KVStore> MutableFactory for Storage<S> {
    type Store = S;

    fn create_mutable_storage(&self) -> Result<MutableStorage<S>, StorageError> {
        let top_hash = self.top_hash()?;
        let height = self.height()?;
        Ok(MutableStorage::new(self.store.clone(), top_hash, height))
    }

    fn commit(&mut self, storage: MutableStorage<S>) -> Result<Vec<Arc<Block>>, StorageError> {
        let MutableStorage {
            wsv,
            top_hash,
            height,
            pending_blocks,
        } = storage;

        let mut batch = S::WriteBatch::new();
        wsv.flatten().apply_to(&mut batch);
        for block in &pending_blocks {
            batch.set(&block_key(&block.hash), &block.try_to_vec().unwrap());
            batch.set(
                &block_at_height_key(block.height),
                &block.hash.try_to_vec().unwrap(),
            );
        }
        batch.set(&paths::TOP_HASH, &top_hash.try_to_vec().unwrap());
        batch.set(&paths::CHAIN_HEIGHT, &height.try_to_vec().unwrap());
        self.store.write(batch);

        Ok(pending_blocks)
    }
}

pub(crate) fn block_key(hash: &CryptoHash) -> Vec<u8> {
    paths::combine(&paths::BLOCKS, &hash.bytes())
}

pub(crate) fn block_at_height_key(height: BlockHeight) -> Vec<u8> {
    paths::combine(&paths::BLOCK_AT_HEIGHT, &height.try_to_vec().unwrap())
}
