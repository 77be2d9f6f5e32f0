/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests the on-demand ordering service through a running node: proposal packing at the
//! transaction limit, round succession on commit and reject outcomes, and eviction of old
//! proposals from the cache.

mod common;

use commitflow_rs::node::{Configuration, Node, NodeSpec};
use commitflow_rs::ordering::RoundOutcome;
use commitflow_rs::types::basic::{BlockHeight, Round};

use common::fixtures;
use common::loader::NullLoader;
use common::logging::setup_logger;
use common::mem_db::MemDB;

fn start_node(transaction_limit: usize, max_cached_proposals: usize) -> Node<MemDB> {
    let kv_store = MemDB::new();
    Node::initialize(kv_store.clone(), fixtures::initial_state());
    NodeSpec::builder()
        .kv_store(kv_store)
        .block_loader(NullLoader)
        .configuration(
            Configuration::builder()
                .transaction_limit(transaction_limit)
                .max_cached_proposals(max_cached_proposals)
                .log_events(false)
                .build(),
        )
        .build()
        .start()
}

#[test]
fn pack_at_most_the_transaction_limit_and_discard_the_rest() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Start a node whose ordering service packs at most 2 transactions per proposal.
    let node = start_node(2, 4);
    let ordering = node.ordering();
    assert_eq!(ordering.current_round(), Round::initial());

    // 2. Submit 5 distinct transactions.
    let submitted: Vec<_> = (0..5u128)
        .map(|i| fixtures::transaction(fixtures::alice(), vec![fixtures::mint(i + 1)]))
        .collect();
    ordering.on_transactions(submitted.clone());

    // 3. Conclude the initial round with a commit; its proposal gets packed and ordering moves
    //    to round [2, 1].
    ordering.on_collaboration_outcome(RoundOutcome::Successful);
    assert_eq!(ordering.current_round(), Round::new(2, 1));

    // 4. The concluded round's proposal holds exactly the first 2 transactions, in arrival
    //    order. The round still collecting has no proposal yet.
    let proposal = ordering.on_request_proposal(Round::initial()).unwrap();
    assert_eq!(proposal.len(), 2);
    assert_eq!(proposal.height, BlockHeight::new(1));
    assert_eq!(proposal.transactions[0].hash, submitted[0].hash);
    assert_eq!(proposal.transactions[1].hash, submitted[1].hash);
    assert!(ordering.on_request_proposal(Round::new(2, 1)).is_none());

    // 5. The 3 transactions beyond the limit were discarded, not carried over: concluding the
    //    next round packs nothing.
    ordering.on_collaboration_outcome(RoundOutcome::Successful);
    assert_eq!(ordering.current_round(), Round::new(3, 1));
    assert!(ordering.on_request_proposal(Round::new(2, 1)).is_none());
}

#[test]
fn reject_outcome_advances_the_reject_round_at_the_same_height() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Start a node and submit one transaction.
    let node = start_node(8, 4);
    let ordering = node.ordering();
    let tx = fixtures::transaction(fixtures::alice(), vec![fixtures::mint(1)]);
    ordering.on_transactions(vec![tx.clone()]);

    // 2. Conclude the initial round with a reject; the block round stays at 1.
    ordering.on_collaboration_outcome(RoundOutcome::Reject);
    assert_eq!(ordering.current_round(), Round::new(1, 2));

    // 3. The concluded round's proposal targets height 1.
    let proposal = ordering.on_request_proposal(Round::initial()).unwrap();
    assert_eq!(proposal.height, BlockHeight::new(1));
    assert_eq!(proposal.transactions[0].hash, tx.hash);

    // 4. A commit in the reject round moves on to block round 2 and resets the reject counter.
    ordering.on_collaboration_outcome(RoundOutcome::Successful);
    assert_eq!(ordering.current_round(), Round::new(2, 1));
}

#[test]
fn oldest_proposals_are_evicted_beyond_the_cache_limit() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Start a node that caches at most 2 proposals.
    let node = start_node(8, 2);
    let ordering = node.ordering();

    // 2. Conclude 3 rounds, each with a pending transaction, so 3 proposals get packed.
    for i in 0..3u128 {
        let tx = fixtures::transaction(fixtures::alice(), vec![fixtures::mint(i + 1)]);
        ordering.on_transactions(vec![tx]);
        ordering.on_collaboration_outcome(RoundOutcome::Successful);
    }

    // 3. The oldest proposal (for the initial round) was evicted; the newer two are still held.
    assert!(ordering.on_request_proposal(Round::initial()).is_none());
    assert!(ordering.on_request_proposal(Round::new(2, 1)).is_some());
    assert!(ordering.on_request_proposal(Round::new(3, 1)).is_some());
}

#[test]
fn requesting_an_unknown_round_returns_nothing() {
    setup_logger(log::LevelFilter::Trace);

    let node = start_node(8, 4);
    assert!(node.ordering().on_request_proposal(Round::new(7, 1)).is_none());
}

#[test]
fn repeated_requests_see_the_same_proposal() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Pack one proposal.
    let node = start_node(8, 4);
    let ordering = node.ordering();
    ordering.on_transactions(vec![fixtures::transaction(
        fixtures::alice(),
        vec![fixtures::mint(1)],
    )]);
    ordering.on_collaboration_outcome(RoundOutcome::Successful);

    // 2. Two requests for the same round observe identical content.
    let first = ordering.on_request_proposal(Round::initial()).unwrap();
    let second = ordering.on_request_proposal(Round::initial()).unwrap();
    assert_eq!(first.height, second.height);
    assert_eq!(
        first.transactions.iter().map(|tx| tx.hash).collect::<Vec<_>>(),
        second.transactions.iter().map(|tx| tx.hash).collect::<Vec<_>>(),
    );
}
