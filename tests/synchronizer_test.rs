/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! End-to-end tests of a running node's synchronizer: directly applying consensus outcomes,
//! acknowledging empty outcomes without persisting anything, catching up with peers through the
//! block loader, and serving committed blocks back out.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use commitflow_rs::node::{Configuration, Node, NodeSpec};
use commitflow_rs::types::basic::{BlockHeight, CryptoHash, Round};
use commitflow_rs::types::block::BlockVariant;

use common::fixtures::{self, ALICE_INITIAL_COINS};
use common::loader::ScriptedLoader;
use common::logging::setup_logger;
use common::mem_db::MemDB;

struct TestNode {
    node: Node<MemDB>,
    loader: ScriptedLoader,
    commits: Arc<AtomicUsize>,
    empty_commits: Arc<AtomicUsize>,
    catch_ups: Arc<AtomicUsize>,
}

fn start_node() -> TestNode {
    let kv_store = MemDB::new();
    Node::initialize(kv_store.clone(), fixtures::initial_state());

    let loader = ScriptedLoader::new();
    let commits = Arc::new(AtomicUsize::new(0));
    let empty_commits = Arc::new(AtomicUsize::new(0));
    let catch_ups = Arc::new(AtomicUsize::new(0));

    let commits_in_handler = commits.clone();
    let empty_commits_in_handler = empty_commits.clone();
    let catch_ups_in_handler = catch_ups.clone();
    let node = NodeSpec::builder()
        .kv_store(kv_store)
        .block_loader(loader.clone())
        .configuration(
            Configuration::builder()
                .transaction_limit(8)
                .max_cached_proposals(4)
                .sync_retry_base(Duration::from_millis(10))
                .sync_retry_cap(Duration::from_millis(100))
                .log_events(true)
                .build(),
        )
        .on_commit_chain(move |_| {
            commits_in_handler.fetch_add(1, Ordering::Relaxed);
        })
        .on_empty_commit(move |_| {
            empty_commits_in_handler.fetch_add(1, Ordering::Relaxed);
        })
        .on_end_catch_up(move |_| {
            catch_ups_in_handler.fetch_add(1, Ordering::Relaxed);
        })
        .build()
        .start();

    TestNode {
        node,
        loader,
        commits,
        empty_commits,
        catch_ups,
    }
}

fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for: {}", description);
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn committed_alice_coins(node: &Node<MemDB>) -> u128 {
    use commitflow_rs::state::mutable_storage::MutableFactory;
    node.storage()
        .create_mutable_storage()
        .unwrap()
        .wsv()
        .balance(&fixtures::alice(), &fixtures::coin())
        .unwrap()
        .unwrap_or(0)
}

#[test]
fn directly_extending_outcomes_are_applied_and_committed() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Start a node and hand it an outcome that directly extends the genesis state.
    let test_node = start_node();
    let signer = fixtures::random_signer();
    let chain = fixtures::mint_chain(1, signer);
    test_node
        .node
        .submit_outcome(BlockVariant::Occupied(chain[0].clone()));

    // 2. The synchronizer applies and commits it.
    wait_until("block 1 to be committed", || {
        test_node.node.storage().height().unwrap() == BlockHeight::new(1)
    });
    assert_eq!(test_node.node.storage().top_hash().unwrap(), chain[0].hash);
    assert_eq!(committed_alice_coins(&test_node.node), ALICE_INITIAL_COINS + 10);

    // 3. Ordering was told the round committed, the cache holds the outcome, and the commit
    //    handler fired.
    wait_until("ordering to advance to round [2, 1]", || {
        test_node.node.ordering().current_round() == Round::new(2, 1)
    });
    assert_eq!(
        test_node.node.block_cache().get().unwrap().hash(),
        chain[0].hash
    );
    wait_until("the commit handler to fire", || {
        test_node.commits.load(Ordering::Relaxed) == 1
    });

    // 4. A stale re-submission of the same outcome is ignored.
    test_node
        .node
        .submit_outcome(BlockVariant::Occupied(chain[0].clone()));
    thread::sleep(Duration::from_millis(200));
    assert_eq!(test_node.node.storage().height().unwrap(), BlockHeight::new(1));
    assert_eq!(test_node.node.ordering().current_round(), Round::new(2, 1));
    assert_eq!(test_node.commits.load(Ordering::Relaxed), 1);
}

#[test]
fn empty_outcomes_advance_the_round_without_persisting() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Hand the node an empty outcome at the next height.
    let test_node = start_node();
    let signer = fixtures::random_signer();
    let empty = fixtures::signed_empty_block(1, CryptoHash::genesis(), signer);
    test_node
        .node
        .submit_outcome(BlockVariant::Empty(empty.clone()));

    // 2. Ordering moves to the next reject round at the same height.
    wait_until("ordering to advance to round [1, 2]", || {
        test_node.node.ordering().current_round() == Round::new(1, 2)
    });

    // 3. Nothing was persisted, but the outcome is cached and the empty-commit handler fired.
    assert_eq!(test_node.node.storage().height().unwrap(), BlockHeight::new(0));
    assert_eq!(
        test_node.node.storage().top_hash().unwrap(),
        CryptoHash::genesis()
    );
    assert_eq!(test_node.node.block_cache().get().unwrap().hash(), empty.hash);
    wait_until("the empty-commit handler to fire", || {
        test_node.empty_commits.load(Ordering::Relaxed) == 1
    });
}

#[test]
fn nodes_catch_up_with_peers_on_outcomes_ahead_of_them() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Script a peer with a 3-block chain, then hand the node only the newest outcome, which
    //    is 2 blocks ahead of its committed state.
    let test_node = start_node();
    let signer = fixtures::random_signer();
    let chain = fixtures::mint_chain(3, signer);
    test_node.loader.script(signer, chain.clone());
    test_node
        .node
        .submit_outcome(BlockVariant::Occupied(chain[2].clone()));

    // 2. The synchronizer retrieves the missing blocks from the signing peer and commits them
    //    all.
    wait_until("the node to catch up to height 3", || {
        test_node.node.storage().height().unwrap() == BlockHeight::new(3)
    });
    assert_eq!(test_node.node.storage().top_hash().unwrap(), chain[2].hash);
    assert_eq!(
        committed_alice_coins(&test_node.node),
        ALICE_INITIAL_COINS + 30
    );
    wait_until("the catch-up handler to fire", || {
        test_node.catch_ups.load(Ordering::Relaxed) == 1
    });

    // 3. The outcome concluded a round, so ordering moved on, and the outcome is cached.
    wait_until("ordering to advance to round [2, 1]", || {
        test_node.node.ordering().current_round() == Round::new(2, 1)
    });
    assert_eq!(
        test_node.node.block_cache().get().unwrap().hash(),
        chain[2].hash
    );

    // 4. The node's own block server now serves the full chain to others.
    let requester = fixtures::random_signer();
    let served = test_node
        .node
        .block_server()
        .handle_blocks_request(requester, BlockHeight::new(1))
        .unwrap();
    let served_hashes: Vec<_> = served.iter().map(|block| block.hash).collect();
    let chain_hashes: Vec<_> = chain.iter().map(|block| block.hash).collect();
    assert_eq!(served_hashes, chain_hashes);
    // 5. A single-block request is answered from the cache for the latest outcome only.
    assert_eq!(
        test_node
            .node
            .block_server()
            .handle_block_request(&chain[2].hash)
            .unwrap()
            .hash(),
        chain[2].hash
    );
    assert!(test_node
        .node
        .block_server()
        .handle_block_request(&chain[0].hash)
        .is_none());
}

#[test]
fn peer_chains_that_miss_the_outcome_are_never_applied() {
    setup_logger(log::LevelFilter::Trace);

    use commitflow_rs::types::basic::{SignatureBytes, Timestamp};
    use commitflow_rs::types::block::{Block, BlockSignature};
    use commitflow_rs::types::transaction::Transaction;

    // 1. Two signing peers: a stray one holding a well-formed fork that never reaches the
    //    outcome, and a helpful one holding the real chain. The stray peer is listed first.
    let test_node = start_node();
    let stray = fixtures::random_signer();
    let helpful = fixtures::random_signer();

    let mut fork = Vec::new();
    let mut prev_hash = CryptoHash::genesis();
    for height in 1..=2u64 {
        let tx = Transaction::new(
            fixtures::alice(),
            vec![fixtures::mint(100)],
            Timestamp::now(),
            None,
        );
        let block = fixtures::signed_block(height, prev_hash, vec![tx], stray);
        prev_hash = block.hash;
        fork.push(block);
    }
    let chain = fixtures::mint_chain(3, helpful);

    // Same header as the chain's tip, signed by both peers. The hash covers the header only,
    // so it stays the tip's hash.
    let target = Arc::new(Block::new(
        chain[2].height,
        chain[2].prev_hash,
        chain[2].created_at,
        chain[2].transactions.clone(),
        vec![
            BlockSignature {
                signer: stray,
                signature: SignatureBytes::new([0u8; 64]),
            },
            BlockSignature {
                signer: helpful,
                signature: SignatureBytes::new([0u8; 64]),
            },
        ],
    ));
    assert_eq!(target.hash, chain[2].hash);

    test_node.loader.script(stray, fork);
    test_node.loader.script(helpful, chain.clone());
    test_node
        .node
        .submit_outcome(BlockVariant::Occupied(target));

    // 2. Catch-up lands on the helpful peer's chain.
    wait_until("the node to catch up to height 3", || {
        test_node.node.storage().height().unwrap() == BlockHeight::new(3)
    });
    assert_eq!(test_node.node.storage().top_hash().unwrap(), chain[2].hash);

    // 3. None of the fork's mints ever reached the ledger.
    assert_eq!(
        committed_alice_coins(&test_node.node),
        ALICE_INITIAL_COINS + 30
    );
}

#[test]
fn failing_blocks_are_rolled_back_and_not_committed() {
    setup_logger(log::LevelFilter::Trace);

    // 1. Hand the node a correctly linked block whose transaction cannot validate (bob may not
    //    mint).
    let test_node = start_node();
    let signer = fixtures::random_signer();
    let bad_tx = commitflow_rs::types::transaction::Transaction::new(
        fixtures::bob(),
        vec![fixtures::mint(1)],
        commitflow_rs::types::basic::Timestamp::now(),
        None,
    );
    let bad_block = fixtures::signed_block(1, CryptoHash::genesis(), vec![bad_tx], signer);
    test_node
        .node
        .submit_outcome(BlockVariant::Occupied(bad_block));

    // 2. The block is rejected as a whole and the chain does not move.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(test_node.node.storage().height().unwrap(), BlockHeight::new(0));
    assert_eq!(test_node.commits.load(Ordering::Relaxed), 0);

    // 3. The node still makes progress on a subsequent well-formed outcome.
    let chain = fixtures::mint_chain(1, signer);
    test_node
        .node
        .submit_outcome(BlockVariant::Occupied(chain[0].clone()));
    wait_until("block 1 to be committed", || {
        test_node.node.storage().height().unwrap() == BlockHeight::new(1)
    });
}
