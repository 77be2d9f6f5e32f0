/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The on-demand ordering service.
//!
//! The service never pushes proposals anywhere. Transactions accumulate in the current round's
//! pending queue, and a proposal is packed only when that round concludes:
//! [`on_collaboration_outcome`] drains the queue's head (up to the transaction limit) into a
//! proposal indexed by the round that just closed, then opens the successor round. Consensus
//! later pulls the proposal with [`on_request_proposal`]; the current round and future rounds
//! have no proposal yet and report none.
//!
//! Proposals for concluded rounds stay cached so that lagging peers can still request them, with
//! the oldest rounds evicted once more than `max_cached_proposals` are held.
//!
//! [`on_collaboration_outcome`]: OnDemandOrderingService::on_collaboration_outcome
//! [`on_request_proposal`]: OnDemandOrderingService::on_request_proposal

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use crate::events::{
    EvictProposalEvent, Event, PackProposalEvent, ReceiveTransactionsEvent, StartRoundEvent,
};
use crate::types::basic::{BlockHeight, Round, Timestamp};
use crate::types::transaction::{Proposal, Transaction, TransactionBatch};

/// How the just-concluded consensus round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A block was committed: ordering moves to the next block round.
    Successful,

    /// The round produced no block: ordering moves to the next reject round at the same height.
    Reject,
}

pub struct OnDemandOrderingService {
    transaction_limit: usize,
    max_cached_proposals: usize,
    state: RwLock<RoundState>,
    event_publisher: Option<Sender<Event>>,
}

struct RoundState {
    current_round: Round,
    // Mutex rather than part of the RwLock'd state proper, so that transaction ingestion only
    // needs the read lock and never contends with proposal requests.
    pending: Mutex<VecDeque<Arc<Transaction>>>,
    proposals: HashMap<Round, Arc<Proposal>>,
    // Concluded rounds, oldest first. Drives proposal eviction.
    round_history: VecDeque<Round>,
}

impl OnDemandOrderingService {
    pub(crate) fn new(
        transaction_limit: usize,
        max_cached_proposals: usize,
        event_publisher: Option<Sender<Event>>,
    ) -> OnDemandOrderingService {
        OnDemandOrderingService {
            transaction_limit,
            max_cached_proposals,
            state: RwLock::new(RoundState {
                current_round: Round::initial(),
                pending: Mutex::new(VecDeque::new()),
                proposals: HashMap::new(),
                round_history: VecDeque::new(),
            }),
            event_publisher,
        }
    }

    /// Get the round ordering is currently collecting transactions for.
    pub fn current_round(&self) -> Round {
        self.state.read().unwrap().current_round
    }

    /// Enqueue transactions for inclusion in a future proposal.
    pub fn on_transactions(&self, transactions: Vec<Arc<Transaction>>) {
        let state = self.state.read().unwrap();
        let count = transactions.len();
        state.pending.lock().unwrap().extend(transactions);

        Event::publish(
            &self.event_publisher,
            Event::ReceiveTransactions(ReceiveTransactionsEvent {
                timestamp: SystemTime::now(),
                round: state.current_round,
                count,
            }),
        );
    }

    /// Enqueue every transaction of a batch, preserving batch order.
    pub fn on_batch(&self, batch: TransactionBatch) {
        self.on_transactions(batch.into_transactions())
    }

    /// Get the cached proposal for `round`, if one was packed and has not been evicted.
    pub fn on_request_proposal(&self, round: Round) -> Option<Arc<Proposal>> {
        self.state.read().unwrap().proposals.get(&round).cloned()
    }

    /// Conclude the current round and open its successor.
    ///
    /// If the concluded round collected any transactions, at most `transaction_limit` of them are
    /// packed into its proposal, in arrival order; whatever remains in the queue is discarded,
    /// since transactions beyond the limit were either already committed or will be resubmitted
    /// by their clients. A round that collected nothing gets no proposal entry at all: consensus
    /// treats the absence of a proposal as "nothing to propose".
    pub fn on_collaboration_outcome(&self, outcome: RoundOutcome) {
        let mut state = self.state.write().unwrap();

        let closed_round = state.current_round;
        let packed = {
            let mut pending = state.pending.lock().unwrap();
            let packed: Vec<Arc<Transaction>> = pending
                .drain(..)
                .take(self.transaction_limit)
                .collect();
            pending.clear();
            packed
        };

        if !packed.is_empty() {
            let proposal = Arc::new(Proposal::new(
                BlockHeight::new(closed_round.block_round),
                Timestamp::now(),
                packed,
            ));
            state.proposals.insert(closed_round, proposal.clone());

            Event::publish(
                &self.event_publisher,
                Event::PackProposal(PackProposalEvent {
                    timestamp: SystemTime::now(),
                    round: closed_round,
                    proposal,
                }),
            );
        }

        state.round_history.push_back(closed_round);
        while state.round_history.len() > self.max_cached_proposals {
            let evicted = state.round_history.pop_front().unwrap();
            if state.proposals.remove(&evicted).is_some() {
                Event::publish(
                    &self.event_publisher,
                    Event::EvictProposal(EvictProposalEvent {
                        timestamp: SystemTime::now(),
                        round: evicted,
                    }),
                );
            }
        }

        let next_round = match outcome {
            RoundOutcome::Successful => state.current_round.successor_on_commit(),
            RoundOutcome::Reject => state.current_round.successor_on_reject(),
        };
        state.current_round = next_round;

        Event::publish(
            &self.event_publisher,
            Event::StartRound(StartRoundEvent {
                timestamp: SystemTime::now(),
                round: next_round,
            }),
        );
    }
}
