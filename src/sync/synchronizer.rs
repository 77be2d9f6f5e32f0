/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The synchronizer thread.
//!
//! The synchronizer sits between consensus and the ledger. Consensus pushes each round's outcome
//! through the consensus gate; the synchronizer applies it to the ledger and advances the
//! ordering service's round. Three cases arise for every outcome:
//!
//! 1. The outcome directly extends the committed chain: apply it (or, for an empty block, just
//!    acknowledge it) and move on.
//! 2. The outcome is ahead of the committed chain: this node missed commits, so enter catch-up
//!    and download the missing blocks from the peers that signed the outcome, retrying with
//!    capped exponential backoff until the chain reaches the outcome.
//! 3. The outcome is at or below the committed height: it was already applied, ignore it.
//!
//! Every committed outcome is also placed in the [`ConsensusBlockCache`] so the block server can
//! serve it to peers before (or, for empty blocks, despite never) reaching persistent storage.

use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use ed25519_dalek::VerifyingKey;
use rand::Rng;

use crate::events::{
    ApplyBlockFailedEvent, CommitChainEvent, EmptyCommitEvent, EndCatchUpEvent, Event,
    SkipOutcomeEvent, StartCatchUpEvent,
};
use crate::ordering::{OnDemandOrderingService, RoundOutcome};
use crate::state::mutable_storage::{MutableFactory, MutableStorage};
use crate::sync::block_cache::ConsensusBlockCache;
use crate::sync::block_loader::BlockLoader;
use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::{Block, BlockVariant};
use crate::validation::chain::ChainValidator;

/// How many times creating a [`MutableStorage`] is attempted before the outcome is skipped.
const STORAGE_CREATE_ATTEMPTS: u32 = 3;

pub(crate) struct Synchronizer<F: MutableFactory, L: BlockLoader> {
    factory: F,
    loader: L,
    ordering: Arc<OnDemandOrderingService>,
    block_cache: Arc<ConsensusBlockCache>,
    consensus_gate: Receiver<BlockVariant>,
    retry_base: Duration,
    retry_cap: Duration,
    event_publisher: Option<Sender<Event>>,
    shutdown_signal: Receiver<()>,
}

enum CatchUp {
    Reached,
    Abandoned,
    ShutDown,
}

impl<F: MutableFactory, L: BlockLoader> Synchronizer<F, L> {
    pub(crate) fn new(
        factory: F,
        loader: L,
        ordering: Arc<OnDemandOrderingService>,
        block_cache: Arc<ConsensusBlockCache>,
        consensus_gate: Receiver<BlockVariant>,
        retry_base: Duration,
        retry_cap: Duration,
        event_publisher: Option<Sender<Event>>,
        shutdown_signal: Receiver<()>,
    ) -> Synchronizer<F, L> {
        Synchronizer {
            factory,
            loader,
            ordering,
            block_cache,
            consensus_gate,
            retry_base,
            retry_cap,
            event_publisher,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("synchronizer thread disconnected from main thread")
                }
            }

            if let Ok(commit) = self.consensus_gate.try_recv() {
                if !self.process_commit(commit) {
                    return;
                }
            }

            thread::yield_now();
        })
    }

    /// Apply one consensus outcome. Returns false if a shutdown was observed mid-way and the
    /// thread should exit.
    fn process_commit(&mut self, commit: BlockVariant) -> bool {
        let storage = match self.create_storage(&commit) {
            Some(storage) => storage,
            None => return true,
        };
        let committed_height = storage.height();
        let committed_top = *storage.top_hash();

        // Already applied. Consensus can re-deliver an outcome after a restart.
        if commit.height() <= committed_height {
            return true;
        }

        let extends_directly =
            commit.height() == committed_height + 1 && commit.prev_hash() == committed_top;

        if extends_directly {
            match &commit {
                BlockVariant::Occupied(block) => {
                    let block = block.clone();
                    if !self.apply_and_commit(storage, &block) {
                        return true;
                    }
                }
                BlockVariant::Empty(_) => drop(storage),
            }
        } else {
            drop(storage);
            match self.catch_up(&commit) {
                CatchUp::Reached => (),
                CatchUp::Abandoned => return true,
                CatchUp::ShutDown => return false,
            }
        }

        self.block_cache.insert(commit.clone());
        match commit {
            BlockVariant::Occupied(_) => {
                self.ordering.on_collaboration_outcome(RoundOutcome::Successful)
            }
            BlockVariant::Empty(empty_block) => {
                Event::publish(
                    &self.event_publisher,
                    Event::EmptyCommit(EmptyCommitEvent {
                        timestamp: SystemTime::now(),
                        block: empty_block.hash,
                        height: empty_block.height,
                    }),
                );
                self.ordering.on_collaboration_outcome(RoundOutcome::Reject)
            }
        }
        true
    }

    /// Apply `block` to `storage` and commit. Returns whether the chain advanced.
    fn apply_and_commit(
        &mut self,
        mut storage: MutableStorage<F::Store>,
        block: &Arc<Block>,
    ) -> bool {
        let height = storage.height();
        if let Err(err) = storage.apply_block(block, |block, _wsv, top_hash| {
            ChainValidator::extends(block, top_hash, height)
        }) {
            Event::publish(
                &self.event_publisher,
                Event::ApplyBlockFailed(ApplyBlockFailedEvent {
                    timestamp: SystemTime::now(),
                    block: block.hash,
                    reason: err.to_string(),
                }),
            );
            return false;
        }
        self.commit_storage(storage, &block.hash)
    }

    /// Commit `storage`, publishing the committed chain. Returns whether the commit succeeded.
    fn commit_storage(&mut self, storage: MutableStorage<F::Store>, cause: &CryptoHash) -> bool {
        match self.factory.commit(storage) {
            Ok(blocks) => {
                Event::publish(
                    &self.event_publisher,
                    Event::CommitChain(CommitChainEvent {
                        timestamp: SystemTime::now(),
                        blocks,
                    }),
                );
                true
            }
            Err(err) => {
                self.skip_outcome(cause, &err.to_string());
                false
            }
        }
    }

    /// Download the chain between the committed top and `commit` from the peers that signed
    /// `commit`. A peer's chain is only applied after the whole of it has been validated and
    /// shown to reach the outcome; a chain that fails either check leaves the ledger untouched
    /// and the next signer is tried. The sweep over peers repeats with capped exponential
    /// backoff until the chain reaches the outcome.
    fn catch_up(&mut self, commit: &BlockVariant) -> CatchUp {
        // An empty block exists only in its signers' caches, never in their committed chains, so
        // peers can only bring us up to its predecessor.
        let (target_height, target_hash) = match commit {
            BlockVariant::Occupied(block) => (block.height, block.hash),
            BlockVariant::Empty(empty_block) => (
                BlockHeight::new(empty_block.height.int().saturating_sub(1)),
                empty_block.prev_hash,
            ),
        };

        Event::publish(
            &self.event_publisher,
            Event::StartCatchUp(StartCatchUpEvent {
                timestamp: SystemTime::now(),
                target_height,
                target_hash,
            }),
        );

        let mut blocks_applied: u64 = 0;
        let mut sweep: u32 = 0;
        loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return CatchUp::ShutDown,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("synchronizer thread disconnected from main thread")
                }
            }

            for signer in commit.signers() {
                // Malformed signer keys cannot belong to reachable peers.
                if VerifyingKey::from_bytes(&signer).is_err() {
                    continue;
                }

                let storage = match self.create_storage(commit) {
                    Some(storage) => storage,
                    None => return CatchUp::Abandoned,
                };
                let committed_height = storage.height();
                let committed_top = *storage.top_hash();
                drop(storage);
                if committed_height >= target_height && committed_top == target_hash {
                    Event::publish(
                        &self.event_publisher,
                        Event::EndCatchUp(EndCatchUpEvent {
                            timestamp: SystemTime::now(),
                            blocks_applied,
                        }),
                    );
                    return CatchUp::Reached;
                }

                let blocks = self.loader.retrieve_blocks(&signer, committed_height + 1);
                if blocks.is_empty() {
                    continue;
                }

                // The whole chain must check out, and must end at the committed outcome,
                // before any of it touches the ledger.
                if !ChainValidator::validate_chain(&blocks, &committed_top, committed_height) {
                    log::warn!(
                        "catch-up: peer chain does not validly extend height {}",
                        committed_height.int()
                    );
                    continue;
                }
                if !blocks
                    .last()
                    .map(|block| block.hash == target_hash)
                    .unwrap_or(false)
                {
                    log::warn!(
                        "catch-up: peer chain does not reach the committed outcome at height {}",
                        target_height.int()
                    );
                    continue;
                }

                let mut completed = true;
                for block in &blocks {
                    let storage = match self.create_storage(commit) {
                        Some(storage) => storage,
                        None => return CatchUp::Abandoned,
                    };
                    if !self.apply_and_commit(storage, block) {
                        completed = false;
                        break;
                    }
                    blocks_applied += 1;
                }

                if completed {
                    Event::publish(
                        &self.event_publisher,
                        Event::EndCatchUp(EndCatchUpEvent {
                            timestamp: SystemTime::now(),
                            blocks_applied,
                        }),
                    );
                    return CatchUp::Reached;
                }
            }

            let delay = self.backoff_delay(sweep);
            log::warn!(
                "catch-up: target height {} not reached, retrying in {}ms",
                target_height,
                delay.as_millis()
            );
            thread::sleep(delay);
            sweep = sweep.saturating_add(1);
        }
    }

    /// Exponential backoff from `retry_base`, capped at `retry_cap`, with up to 50% added jitter.
    fn backoff_delay(&self, sweep: u32) -> Duration {
        let exponent = sweep.min(16);
        let delay = self
            .retry_base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.retry_cap)
            .min(self.retry_cap);
        let jitter_ms = rand::thread_rng().gen_range(0, delay.as_millis() as u64 / 2 + 1);
        delay + Duration::from_millis(jitter_ms)
    }

    /// Create a fresh [`MutableStorage`], retrying a bounded number of times. On exhaustion the
    /// outcome is skipped with an event rather than silently dropped.
    fn create_storage(&mut self, commit: &BlockVariant) -> Option<MutableStorage<F::Store>> {
        let mut last_error = None;
        for attempt in 1..=STORAGE_CREATE_ATTEMPTS {
            match self.factory.create_mutable_storage() {
                Ok(storage) => return Some(storage),
                Err(err) => {
                    log::warn!(
                        "mutable storage creation failed (attempt {} of {}): {}",
                        attempt,
                        STORAGE_CREATE_ATTEMPTS,
                        err
                    );
                    last_error = Some(err);
                    thread::sleep(self.retry_base);
                }
            }
        }
        let reason = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| String::from("unknown"));
        self.skip_outcome(&commit.hash(), &reason);
        None
    }

    fn skip_outcome(&self, block: &CryptoHash, reason: &str) {
        Event::publish(
            &self.event_publisher,
            Event::SkipOutcome(SkipOutcomeEvent {
                timestamp: SystemTime::now(),
                block: *block,
                reason: String::from(reason),
            }),
        );
    }
}
