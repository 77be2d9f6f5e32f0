/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The commit pipeline of a permissioned blockchain node: on-demand transaction ordering, atomic
//! ledger-state application, and chain synchronization.
//!
//! This crate sits between a consensus engine and a key-value store, and covers everything that
//! happens to a transaction after it is signed and before it is durable:
//!
//! - The [ordering service](ordering::OnDemandOrderingService) queues submitted transactions and
//!   packs them into round-indexed [proposals](types::transaction::Proposal) when consensus asks.
//! - [Stateful validation](validation::stateful::validate_proposal) sieves a proposal against the
//!   current world state, keeping the transactions that still apply.
//! - The [synchronizer](sync) receives each round's outcome from consensus and applies it to the
//!   ledger through [`MutableStorage`](state::mutable_storage::MutableStorage), with block-level
//!   all-or-nothing semantics; when an outcome arrives ahead of the local chain, it downloads the
//!   missing blocks from the peers that signed it.
//!
//! Consensus itself, networking, and transaction signature checking live outside this crate,
//! behind the [`BlockLoader`](sync::block_loader::BlockLoader) seam, the
//! [consensus gate](node::Node::submit_outcome), and the assumption that transactions arrive
//! hash-verified.
//!
//! To run a node, implement [`KVStore`](state::kv_store::KVStore) over your persistence layer and
//! [`BlockLoader`](sync::block_loader::BlockLoader) over your networking, then build a
//! [`NodeSpec`](node::NodeSpec) and [start](node::NodeSpec::start) it.

pub mod commands;

pub(crate) mod event_bus;

pub mod events;

pub mod logging;

pub mod node;

pub mod ordering;

pub mod state;

pub mod sync;

pub mod types;

pub mod validation;
