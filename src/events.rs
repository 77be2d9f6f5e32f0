/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of commit pipeline events for event handling and logging.
//! Note: an event for a given action indicates that the action has been completed.

use crate::commands::PublicKeyBytes;
use crate::types::basic::{BlockHeight, CryptoHash, Round};
use crate::types::block::Block;
use crate::types::transaction::Proposal;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::SystemTime;

pub enum Event {
    // Ordering events.
    ReceiveTransactions(ReceiveTransactionsEvent),
    PackProposal(PackProposalEvent),
    EvictProposal(EvictProposalEvent),
    StartRound(StartRoundEvent),
    // Events that change persistent state.
    CommitChain(CommitChainEvent),
    EmptyCommit(EmptyCommitEvent),
    ApplyBlockFailed(ApplyBlockFailedEvent),
    SkipOutcome(SkipOutcomeEvent),
    // Catch-up events.
    StartCatchUp(StartCatchUpEvent),
    EndCatchUp(EndCatchUpEvent),
    // Block serving events.
    ReceiveBlocksRequest(ReceiveBlocksRequestEvent),
    SendBlocksResponse(SendBlocksResponseEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            event_publisher.send(event).unwrap()
        }
    }
}

pub struct ReceiveTransactionsEvent {
    pub timestamp: SystemTime,
    pub round: Round,
    pub count: usize,
}

pub struct PackProposalEvent {
    pub timestamp: SystemTime,
    pub round: Round,
    pub proposal: Arc<Proposal>,
}

pub struct EvictProposalEvent {
    pub timestamp: SystemTime,
    pub round: Round,
}

pub struct StartRoundEvent {
    pub timestamp: SystemTime,
    pub round: Round,
}

pub struct CommitChainEvent {
    pub timestamp: SystemTime,
    pub blocks: Vec<Arc<Block>>,
}

pub struct EmptyCommitEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: BlockHeight,
}

pub struct ApplyBlockFailedEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub reason: String,
}

pub struct SkipOutcomeEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub reason: String,
}

pub struct StartCatchUpEvent {
    pub timestamp: SystemTime,
    pub target_height: BlockHeight,
    pub target_hash: CryptoHash,
}

pub struct EndCatchUpEvent {
    pub timestamp: SystemTime,
    pub blocks_applied: u64,
}

pub struct ReceiveBlocksRequestEvent {
    pub timestamp: SystemTime,
    pub peer: PublicKeyBytes,
    pub start_height: BlockHeight,
}

pub struct SendBlocksResponseEvent {
    pub timestamp: SystemTime,
    pub peer: PublicKeyBytes,
    pub blocks: Vec<Arc<Block>>,
}
