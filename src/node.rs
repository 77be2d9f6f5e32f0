/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, run, and initialize the storage of a commit pipeline node.
//!
//! A node bundles the three halves of the commit pipeline around a shared [`KVStore`]: the
//! [ordering service](crate::ordering::OnDemandOrderingService) collecting transactions into
//! round-indexed proposals, the synchronizer thread applying consensus outcomes to the ledger,
//! and the [block server](crate::sync::block_server::BlockServer) answering peers' catch-up
//! requests.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the node](NodeSpec) with:
//!   1. `NodeSpec::builder` to construct a `NodeSpecBuilder`,
//!   2. The setters of the `NodeSpecBuilder`, and
//!   3. The `NodeSpecBuilder::build` method to construct a [NodeSpec],
//! - The function to [start](NodeSpec::start) a [Node] given its specification,
//! - The function to [initialize](Node::initialize) the node's ledger storage,
//! - [The type](Node) which keeps the node alive.
//!
//! ## Starting a node
//!
//! Here is an example that demonstrates how to build and start running a node using the builder
//! pattern:
//!
//! ```ignore
//! let node =
//!     NodeSpec::builder()
//!     .kv_store(kv_store)
//!     .block_loader(block_loader)
//!     .configuration(configuration)
//!     .on_commit_chain(commit_handler)
//!     .build()
//!     .start()
//! ```
//!
//! ### Required setters
//!
//! - `.kv_store(...)`
//! - `.block_loader(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_receive_transactions(...)`
//! - `.on_pack_proposal(...)`
//! - `.on_evict_proposal(...)`
//! - `.on_start_round(...)`
//! - `.on_commit_chain(...)`
//! - `.on_empty_commit(...)`
//! - `.on_apply_block_failed(...)`
//! - `.on_skip_outcome(...)`
//! - `.on_start_catch_up(...)`
//! - `.on_end_catch_up(...)`
//! - `.on_receive_blocks_request(...)`
//! - `.on_send_blocks_response(...)`

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::event_bus::*;
use crate::events::*;
use crate::ordering::OnDemandOrderingService;
use crate::state::kv_store::KVStore;
use crate::state::mutable_storage::Storage;
use crate::state::write_set::WriteSet;
use crate::sync::block_cache::ConsensusBlockCache;
use crate::sync::block_loader::BlockLoader;
use crate::sync::block_server::BlockServer;
use crate::sync::synchronizer::Synchronizer;
use crate::types::block::BlockVariant;

/// Stores the user-defined parameters required to start the node, that is:
/// 1. The transaction limit: how many transactions the ordering service packs into one proposal
///    at most.
/// 2. The maximum number of cached proposals: how many concluded rounds keep their proposal
///    available to lagging peers before the oldest is evicted.
/// 3. The catch-up retry base: the first delay between sweeps over peers during catch-up. Each
///    fruitless sweep doubles the delay.
/// 4. The catch-up retry cap: the ceiling the catch-up delay grows to.
/// 5. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.transaction_limit(...)`
    - `.max_cached_proposals(...)`
    - `.log_events(...)`

    Optional:
    - `.sync_retry_base(...)`
    - `.sync_retry_cap(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the maximum number of transactions packed into one proposal. Required."))]
    pub transaction_limit: usize,
    #[builder(setter(doc = "Set how many concluded rounds keep their proposal cached. Required."))]
    pub max_cached_proposals: usize,
    #[builder(default = Duration::from_millis(500), setter(doc = "Set the initial delay between catch-up sweeps over peers. Optional, defaults to 500 milliseconds."))]
    pub sync_retry_base: Duration,
    #[builder(default = Duration::from_secs(8), setter(doc = "Set the ceiling the catch-up delay grows to. Optional, defaults to 8 seconds."))]
    pub sync_retry_cap: Duration,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run the [Node].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [NodeSpec]. On the builder call the following methods to construct a valid [NodeSpec].

    Required:
    - `.kv_store(...)`
    - `.block_loader(...)`
    - `.configuration(...)`

    Optional:
    - `.on_receive_transactions(...)`
    - `.on_pack_proposal(...)`
    - `.on_evict_proposal(...)`
    - `.on_start_round(...)`
    - `.on_commit_chain(...)`
    - `.on_empty_commit(...)`
    - `.on_apply_block_failed(...)`
    - `.on_skip_outcome(...)`
    - `.on_start_catch_up(...)`
    - `.on_end_catch_up(...)`
    - `.on_receive_blocks_request(...)`
    - `.on_send_blocks_response(...)`
"))]
pub struct NodeSpec<S: KVStore, L: BlockLoader> {
    // Required parameters
    #[builder(setter(doc = "Set the implementation of the node's Key-Value store. The argument must implement the [KVStore](crate::state::kv_store::KVStore) trait. Required."))]
    kv_store: S,
    #[builder(setter(doc = "Set the implementation of block retrieval from peers. The argument must implement the [BlockLoader](crate::sync::block_loader::BlockLoader) trait. Required."))]
    block_loader: L,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveTransactionsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveTransactionsEvent>),
    doc = "Register a handler closure to be invoked after the ordering service enqueues submitted transactions. Optional."))]
    on_receive_transactions: Option<HandlerPtr<ReceiveTransactionsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PackProposalEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PackProposalEvent>),
    doc = "Register a handler closure to be invoked after the ordering service packs a proposal for a round. Optional."))]
    on_pack_proposal: Option<HandlerPtr<PackProposalEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EvictProposalEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EvictProposalEvent>),
    doc = "Register a handler closure to be invoked after the ordering service evicts an old round's proposal. Optional."))]
    on_evict_proposal: Option<HandlerPtr<EvictProposalEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartRoundEvent>),
    doc = "Register a handler closure to be invoked after the ordering service opens a new round. Optional."))]
    on_start_round: Option<HandlerPtr<StartRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitChainEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitChainEvent>),
    doc = "Register a handler closure to be invoked after blocks are committed to the ledger. Optional."))]
    on_commit_chain: Option<HandlerPtr<CommitChainEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EmptyCommitEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EmptyCommitEvent>),
    doc = "Register a handler closure to be invoked after an empty (reject-round) outcome is acknowledged. Optional."))]
    on_empty_commit: Option<HandlerPtr<EmptyCommitEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ApplyBlockFailedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ApplyBlockFailedEvent>),
    doc = "Register a handler closure to be invoked after a block fails to apply and is rolled back. Optional."))]
    on_apply_block_failed: Option<HandlerPtr<ApplyBlockFailedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SkipOutcomeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SkipOutcomeEvent>),
    doc = "Register a handler closure to be invoked after a consensus outcome is skipped because storage was unavailable. Optional."))]
    on_skip_outcome: Option<HandlerPtr<SkipOutcomeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartCatchUpEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartCatchUpEvent>),
    doc = "Register a handler closure to be invoked after the synchronizer starts catching up with peers. Optional."))]
    on_start_catch_up: Option<HandlerPtr<StartCatchUpEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EndCatchUpEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EndCatchUpEvent>),
    doc = "Register a handler closure to be invoked after the synchronizer finishes catching up. Optional."))]
    on_end_catch_up: Option<HandlerPtr<EndCatchUpEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBlocksRequestEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBlocksRequestEvent>),
    doc = "Register a handler closure to be invoked after the block server receives a catch-up request from a peer. Optional."))]
    on_receive_blocks_request: Option<HandlerPtr<ReceiveBlocksRequestEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SendBlocksResponseEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SendBlocksResponseEvent>),
    doc = "Register a handler closure to be invoked after the block server responds to a catch-up request. Optional."))]
    on_send_blocks_response: Option<HandlerPtr<SendBlocksResponseEvent>>,
}

impl<S: KVStore, L: BlockLoader> NodeSpec<S, L> {
    /// Starts all threads and channels associated with running a node, and returns the handles to
    /// them in a [Node] struct.
    pub fn start(self) -> Node<S> {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_receive_transactions,
            self.on_pack_proposal,
            self.on_evict_proposal,
            self.on_start_round,
            self.on_commit_chain,
            self.on_empty_commit,
            self.on_apply_block_failed,
            self.on_skip_outcome,
            self.on_start_catch_up,
            self.on_end_catch_up,
            self.on_receive_blocks_request,
            self.on_send_blocks_response,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let storage = Storage::new(self.kv_store);
        let block_cache = Arc::new(ConsensusBlockCache::new());
        let ordering = Arc::new(OnDemandOrderingService::new(
            self.configuration.transaction_limit,
            self.configuration.max_cached_proposals,
            event_publisher.clone(),
        ));
        let block_server = BlockServer::new(
            storage.clone(),
            block_cache.clone(),
            event_publisher.clone(),
        );

        let (consensus_gate, consensus_gate_receiver) = mpsc::channel();
        let (synchronizer_shutdown, synchronizer_shutdown_receiver) = mpsc::channel();
        let synchronizer = Synchronizer::new(
            storage.clone(),
            self.block_loader,
            ordering.clone(),
            block_cache.clone(),
            consensus_gate_receiver,
            self.configuration.sync_retry_base,
            self.configuration.sync_retry_cap,
            event_publisher,
            synchronizer_shutdown_receiver,
        );
        let synchronizer = synchronizer.start();

        let (event_bus_shutdown, event_bus_shutdown_receiver) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let event_bus = if !event_handlers.is_empty() {
            Some(start_event_bus(
                event_handlers,
                event_subscriber.unwrap(),          // Safety: should be Some(...).
                event_bus_shutdown_receiver.unwrap(), // Safety: should be Some(...).
            ))
        } else {
            None
        };

        Node {
            storage,
            ordering,
            block_cache,
            block_server,
            consensus_gate,
            synchronizer: Some(synchronizer),
            synchronizer_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads and services of a running node. When this value is dropped,
/// all background threads are gracefully shut down.
pub struct Node<S: KVStore> {
    storage: Storage<S>,
    ordering: Arc<OnDemandOrderingService>,
    block_cache: Arc<ConsensusBlockCache>,
    block_server: BlockServer<S>,
    consensus_gate: Sender<BlockVariant>,
    synchronizer: Option<JoinHandle<()>>,
    synchronizer_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<S: KVStore> Node<S> {
    /// Initializes the node's ledger storage with the initial world state. Must be called exactly
    /// once, on an empty store, before the first [NodeSpec::start] over that store.
    pub fn initialize(kv_store: S, initial_state: WriteSet) {
        let mut storage = Storage::new(kv_store);
        storage.initialize(initial_state);
    }

    /// Get the ordering service, for submitting transactions and requesting proposals.
    pub fn ordering(&self) -> &Arc<OnDemandOrderingService> {
        &self.ordering
    }

    /// Get a read handle over the committed chain.
    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    /// Get the block server, for wiring into the node's networking layer.
    pub fn block_server(&self) -> &BlockServer<S> {
        &self.block_server
    }

    /// Get the cache holding the most recently committed consensus outcome.
    pub fn block_cache(&self) -> &Arc<ConsensusBlockCache> {
        &self.block_cache
    }

    /// Hand a consensus outcome to the synchronizer. Outcomes are processed in submission order.
    pub fn submit_outcome(&self, outcome: BlockVariant) {
        self.consensus_gate
            .send(outcome)
            .expect("synchronizer thread outlives the node handle")
    }
}

impl<S: KVStore> Drop for Node<S> {
    fn drop(&mut self) {
        // Safety: the synchronizer publishes events, so it must stop before the event bus does.

        self.synchronizer_shutdown.send(()).unwrap();
        self.synchronizer.take().unwrap().join().unwrap();

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| shutdown.send(()).unwrap());
        if self.event_bus.is_some() {
            self.event_bus.take().unwrap().join().unwrap();
        }
    }
}
