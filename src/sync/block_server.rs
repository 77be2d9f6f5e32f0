/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The serving side of catch-up: answers peers' requests for committed blocks.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::SystemTime;

use crate::commands::PublicKeyBytes;
use crate::events::{Event, ReceiveBlocksRequestEvent, SendBlocksResponseEvent};
use crate::state::kv_store::{KVStore, StorageError};
use crate::state::mutable_storage::Storage;
use crate::sync::block_cache::ConsensusBlockCache;
use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::{Block, BlockVariant};

pub struct BlockServer<S: KVStore> {
    storage: Storage<S>,
    block_cache: Arc<ConsensusBlockCache>,
    event_publisher: Option<Sender<Event>>,
}

impl<S: KVStore> BlockServer<S> {
    pub(crate) fn new(
        storage: Storage<S>,
        block_cache: Arc<ConsensusBlockCache>,
        event_publisher: Option<Sender<Event>>,
    ) -> BlockServer<S> {
        BlockServer {
            storage,
            block_cache,
            event_publisher,
        }
    }

    /// Serve a peer's catch-up request: every committed block from `start_height` up to the top
    /// of the chain, in height order.
    pub fn handle_blocks_request(
        &self,
        peer: PublicKeyBytes,
        start_height: BlockHeight,
    ) -> Result<Vec<Arc<Block>>, StorageError> {
        Event::publish(
            &self.event_publisher,
            Event::ReceiveBlocksRequest(ReceiveBlocksRequestEvent {
                timestamp: SystemTime::now(),
                peer,
                start_height,
            }),
        );

        let blocks = self.storage.blocks_from_height(start_height)?;

        Event::publish(
            &self.event_publisher,
            Event::SendBlocksResponse(SendBlocksResponseEvent {
                timestamp: SystemTime::now(),
                peer,
                blocks: blocks.clone(),
            }),
        );
        Ok(blocks)
    }

    /// Serve a request for a single block by hash, answered from the consensus cache. Unlike
    /// committed blocks the cache can answer for an empty block, which is never persisted, but
    /// it only ever holds the latest outcome: a request for anything older finds nothing.
    pub fn handle_block_request(&self, hash: &CryptoHash) -> Option<BlockVariant> {
        self.block_cache
            .get()
            .filter(|variant| variant.hash() == *hash)
    }
}
