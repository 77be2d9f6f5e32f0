/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Stateful proposal validation.
//!
//! A proposal fresh from ordering may carry transactions that no longer apply: permissions were
//! revoked since submission, balances were spent, identifiers taken. [`validate_proposal`] runs
//! the proposal against a throwaway extension of the committed state, keeping the transactions
//! that apply and recording a rejection reason for each one that does not. Each transaction is
//! judged independently, but against the state as modified by the accepted transactions before
//! it, since that is exactly the state it would execute in if the proposal became a block.

use std::sync::Arc;

use crate::state::kv_store::StorageError;
use crate::state::mutable_storage::{CommandFailure, MutableFactory};
use crate::types::basic::{BlockHeight, CryptoHash, Timestamp};
use crate::types::transaction::{Proposal, Transaction};

/// A transaction that failed stateful validation, with the first failure that disqualified it.
#[derive(Clone, Debug)]
pub struct RejectedTransaction {
    pub tx_hash: CryptoHash,
    pub failure: CommandFailure,
}

/// The outcome of stateful validation: the proposal's transactions, sieved.
#[derive(Clone, Debug)]
pub struct VerifiedProposal {
    pub height: BlockHeight,
    pub created_at: Timestamp,
    pub accepted: Vec<Arc<Transaction>>,
    pub rejected: Vec<RejectedTransaction>,
}

/// Run `proposal` against a throwaway extension of the committed state, splitting its
/// transactions into accepted and rejected.
///
/// The extension is dropped before returning, so validation never writes to the ledger.
pub fn validate_proposal<F: MutableFactory>(
    factory: &F,
    proposal: &Proposal,
) -> Result<VerifiedProposal, StorageError> {
    let mut storage = factory.create_mutable_storage()?;

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for transaction in &proposal.transactions {
        match storage.apply_transaction(transaction)? {
            Ok(()) => accepted.push(transaction.clone()),
            Err(failure) => rejected.push(RejectedTransaction {
                tx_hash: transaction.hash,
                failure,
            }),
        }
    }

    Ok(VerifiedProposal {
        height: proposal.height,
        created_at: proposal.created_at,
        accepted,
        rejected,
    })
}
