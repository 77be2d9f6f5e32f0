/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Transactions, batches, and the per-round proposals the ordering service builds out of them.

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::commands::Command;
use crate::types::basic::{BlockHeight, CryptoHash, Timestamp};
use crate::types::identifiers::AccountId;

pub use sha2::Sha256 as CryptoHasher;

/// An externally validated list of commands acting on behalf of one creator account.
///
/// Transactions are produced and hash-verified upstream of this crate; the commit pipeline treats
/// them as opaque, immutable values and shares them behind [`Arc`]s.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Transaction {
    pub hash: CryptoHash,
    pub creator: AccountId,
    pub commands: Vec<Command>,
    pub created_at: Timestamp,

    /// Set if this transaction is part of a batch; all transactions of a batch carry the same
    /// marker.
    pub batch: Option<CryptoHash>,
}

impl Transaction {
    /// Create a new `Transaction`, computing its hash from the remaining fields.
    pub fn new(
        creator: AccountId,
        commands: Vec<Command>,
        created_at: Timestamp,
        batch: Option<CryptoHash>,
    ) -> Transaction {
        let hash = Transaction::hash(&creator, &commands, created_at, &batch);
        Transaction {
            hash,
            creator,
            commands,
            created_at,
            batch,
        }
    }

    /// Compute the hash of a transaction's payload.
    pub fn hash(
        creator: &AccountId,
        commands: &Vec<Command>,
        created_at: Timestamp,
        batch: &Option<CryptoHash>,
    ) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&creator.try_to_vec().unwrap());
        hasher.update(&commands.try_to_vec().unwrap());
        hasher.update(&created_at.try_to_vec().unwrap());
        hasher.update(&batch.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

/// A group of transactions that the ordering service treats as a single unit: their relative order
/// is fixed, and they enter a proposal contiguously.
///
/// A batch with a single transaction is the common case; multi-transaction batches come from
/// multi-signature flows assembled upstream.
#[derive(Clone, Debug)]
pub struct TransactionBatch(Vec<Arc<Transaction>>);

impl TransactionBatch {
    /// Create a new `TransactionBatch` wrapping `transactions`, preserving their order.
    pub fn new(transactions: Vec<Arc<Transaction>>) -> Self {
        Self(transactions)
    }

    /// Create a `TransactionBatch` containing a single transaction.
    pub fn single(transaction: Transaction) -> Self {
        Self(vec![Arc::new(transaction)])
    }

    /// Get a reference to the inner `Vec` of this batch.
    pub fn transactions(&self) -> &Vec<Arc<Transaction>> {
        &self.0
    }

    /// Consume the batch, yielding its transactions in order.
    pub fn into_transactions(self) -> Vec<Arc<Transaction>> {
        self.0
    }
}

/// An immutable, ordered, bounded sequence of transactions produced for exactly one round.
///
/// Created once by the ordering service when a round closes and never mutated afterwards.
/// [`OnDemandOrderingService::on_request_proposal`](crate::ordering::OnDemandOrderingService::on_request_proposal)
/// hands out clones, so no caller can reach the service's internal state through one.
#[derive(Clone, Debug)]
pub struct Proposal {
    pub height: BlockHeight,
    pub created_at: Timestamp,
    pub transactions: Vec<Arc<Transaction>>,
}

impl Proposal {
    /// Create a new `Proposal` at `height` containing `transactions`.
    pub fn new(
        height: BlockHeight,
        created_at: Timestamp,
        transactions: Vec<Arc<Transaction>>,
    ) -> Proposal {
        Proposal {
            height,
            created_at,
            transactions,
        }
    }

    /// Get how many transactions are in this proposal.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check whether this proposal carries no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
