/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The seam between the synchronizer and the network.

use std::sync::Arc;

use crate::commands::PublicKeyBytes;
use crate::types::basic::BlockHeight;
use crate::types::block::Block;

/// Fetches committed blocks from a peer during catch-up.
///
/// Implementations wrap whatever transport the node uses to reach other nodes'
/// [block servers](crate::sync::block_server::BlockServer). An implementation should return the
/// peer's committed blocks starting at `from_height` in ascending height order, and an empty
/// vector if the peer is unreachable or has nothing at that height; the synchronizer treats an
/// empty response as "try the next peer".
pub trait BlockLoader: Send + 'static {
    fn retrieve_blocks(&self, peer: &PublicKeyBytes, from_height: BlockHeight) -> Vec<Arc<Block>>;
}
