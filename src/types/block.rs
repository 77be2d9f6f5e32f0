/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' types and their associated methods.
//!
//! A consensus round concludes in one of two shapes: a [`Block`] carrying transactions, or an
//! [`EmptyBlock`] marking a reject round. [`BlockVariant`] is the tagged union of the two, and
//! every consumer matches on it exhaustively: an `EmptyBlock` has no transactions to apply, but
//! still confirms chain position and must be relayed to subscribers.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::commands::PublicKeyBytes;
use crate::types::basic::{BlockHeight, CryptoHash, SignatureBytes, Timestamp};
use crate::types::transaction::{CryptoHasher, Transaction};

/// One consensus participant's signature over a block.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockSignature {
    pub signer: PublicKeyBytes,
    pub signature: SignatureBytes,
}

/// A committed unit of the chain: an ordered transaction list plus the header fields that link it
/// to its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Block {
    pub height: BlockHeight,
    pub hash: CryptoHash,
    pub prev_hash: CryptoHash,
    pub created_at: Timestamp,
    pub transactions: Vec<Transaction>,
    pub signatures: Vec<BlockSignature>,
}

impl Block {
    /// Create a new `Block`, computing its hash from the header fields and transaction hashes.
    pub fn new(
        height: BlockHeight,
        prev_hash: CryptoHash,
        created_at: Timestamp,
        transactions: Vec<Transaction>,
        signatures: Vec<BlockSignature>,
    ) -> Block {
        Block {
            height,
            hash: Block::hash(height, &prev_hash, created_at, &transactions),
            prev_hash,
            created_at,
            transactions,
            signatures,
        }
    }

    /// Compute the hash of a block's header: its height, predecessor hash, creation time, and the
    /// hashes of its transactions in order.
    pub fn hash(
        height: BlockHeight,
        prev_hash: &CryptoHash,
        created_at: Timestamp,
        transactions: &Vec<Transaction>,
    ) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&height.try_to_vec().unwrap());
        hasher.update(&prev_hash.try_to_vec().unwrap());
        hasher.update(&created_at.try_to_vec().unwrap());
        for transaction in transactions {
            hasher.update(&transaction.hash.try_to_vec().unwrap());
        }
        CryptoHash::new(hasher.finalize().into())
    }

    /// Check whether the block's stored hash matches a recomputation from its fields.
    pub fn is_correct(&self) -> bool {
        self.hash == Block::hash(self.height, &self.prev_hash, self.created_at, &self.transactions)
    }
}

/// A reject-round marker: confirms a chain position without carrying transactions.
///
/// Empty blocks are never applied to ledger state and never persisted; they only advance
/// subscribers' view of consensus progress.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct EmptyBlock {
    pub height: BlockHeight,
    pub hash: CryptoHash,
    pub prev_hash: CryptoHash,
    pub signatures: Vec<BlockSignature>,
}

impl EmptyBlock {
    /// Create a new `EmptyBlock`, computing its hash from its height and predecessor hash.
    pub fn new(
        height: BlockHeight,
        prev_hash: CryptoHash,
        signatures: Vec<BlockSignature>,
    ) -> EmptyBlock {
        EmptyBlock {
            height,
            hash: EmptyBlock::hash(height, &prev_hash),
            prev_hash,
            signatures,
        }
    }

    /// Compute the hash of an empty block's header.
    pub fn hash(height: BlockHeight, prev_hash: &CryptoHash) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&height.try_to_vec().unwrap());
        hasher.update(&prev_hash.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

/// The outcome of a consensus round: either a block to apply, or an empty reject-round marker.
///
/// Once constructed, variants are shared, immutable, reference-counted values; cloning one is
/// cheap and no holder can mutate the underlying block.
#[derive(Clone, Debug)]
pub enum BlockVariant {
    Occupied(Arc<Block>),
    Empty(Arc<EmptyBlock>),
}

impl BlockVariant {
    /// Get the height this variant confirms.
    pub fn height(&self) -> BlockHeight {
        match self {
            BlockVariant::Occupied(block) => block.height,
            BlockVariant::Empty(empty_block) => empty_block.height,
        }
    }

    /// Get the hash of this variant.
    pub fn hash(&self) -> CryptoHash {
        match self {
            BlockVariant::Occupied(block) => block.hash,
            BlockVariant::Empty(empty_block) => empty_block.hash,
        }
    }

    /// Get the hash of the block this variant declares as its predecessor.
    pub fn prev_hash(&self) -> CryptoHash {
        match self {
            BlockVariant::Occupied(block) => block.prev_hash,
            BlockVariant::Empty(empty_block) => empty_block.prev_hash,
        }
    }

    /// Get the public keys of the consensus participants that signed this variant, in signature
    /// order.
    pub fn signers(&self) -> Vec<PublicKeyBytes> {
        let signatures = match self {
            BlockVariant::Occupied(block) => &block.signatures,
            BlockVariant::Empty(empty_block) => &empty_block.signatures,
        };
        signatures.iter().map(|signature| signature.signer).collect()
    }
}
