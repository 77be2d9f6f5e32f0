/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests the single-slot consensus block cache: insertion, displacement, release, and sharing
//! across threads.

mod common;

use std::sync::Arc;
use std::thread;

use commitflow_rs::sync::block_cache::ConsensusBlockCache;
use commitflow_rs::types::basic::CryptoHash;
use commitflow_rs::types::block::BlockVariant;

use common::fixtures;

#[test]
fn the_newest_insert_displaces_the_previous_one() {
    let cache = ConsensusBlockCache::new();
    assert!(cache.get().is_none());

    let signer = fixtures::random_signer();
    let first = fixtures::signed_block(1, CryptoHash::genesis(), Vec::new(), signer);
    let second = fixtures::signed_block(2, first.hash, Vec::new(), signer);

    // 1. Inserting fills the slot; getting clones without emptying it.
    cache.insert(BlockVariant::Occupied(first.clone()));
    assert_eq!(cache.get().unwrap().hash(), first.hash);
    assert_eq!(cache.get().unwrap().hash(), first.hash);

    // 2. A newer insert displaces the old variant, whatever its shape.
    cache.insert(BlockVariant::Occupied(second.clone()));
    assert_eq!(cache.get().unwrap().hash(), second.hash);

    let empty = fixtures::signed_empty_block(3, second.hash, signer);
    cache.insert(BlockVariant::Empty(empty.clone()));
    assert_eq!(cache.get().unwrap().hash(), empty.hash);

    // 3. Releasing empties the slot.
    cache.release();
    assert!(cache.get().is_none());
}

#[test]
fn concurrent_inserts_and_releases_never_expose_a_torn_value() {
    let cache = Arc::new(ConsensusBlockCache::new());
    let signer = fixtures::random_signer();
    let chain = fixtures::mint_chain(4, signer);
    let known: Vec<CryptoHash> = chain.iter().map(|block| block.hash).collect();

    // 1. One writer churns the slot through inserts and releases while readers poll it.
    let writer = {
        let cache = cache.clone();
        let chain = chain.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                for block in &chain {
                    cache.insert(BlockVariant::Occupied(block.clone()));
                    cache.release();
                }
            }
            cache.insert(BlockVariant::Occupied(chain[3].clone()));
        })
    };

    // 2. Every read sees either an empty slot or one of the inserted variants, whole.
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let known = known.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    match cache.get() {
                        None => (),
                        Some(BlockVariant::Occupied(block)) => {
                            assert!(block.is_correct());
                            assert!(known.contains(&block.hash));
                        }
                        Some(BlockVariant::Empty(_)) => {
                            panic!("an empty variant was never inserted")
                        }
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    // 3. After the churn the slot holds exactly the writer's final insert.
    assert_eq!(cache.get().unwrap().hash(), known[3]);
}

#[test]
fn readers_on_other_threads_see_the_cached_variant() {
    let cache = Arc::new(ConsensusBlockCache::new());
    let signer = fixtures::random_signer();
    let block = fixtures::signed_block(1, CryptoHash::genesis(), Vec::new(), signer);
    cache.insert(BlockVariant::Occupied(block.clone()));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let expected = block.hash;
            thread::spawn(move || {
                assert_eq!(cache.get().unwrap().hash(), expected);
            })
        })
        .collect();
    for reader in readers {
        reader.join().unwrap();
    }
}
