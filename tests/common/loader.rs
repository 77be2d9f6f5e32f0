/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [BlockLoader] implementations for the integration tests: one scripted with each peer's
//! committed chain in advance, and one that knows no peers at all.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use commitflow_rs::commands::PublicKeyBytes;
use commitflow_rs::sync::block_loader::BlockLoader;
use commitflow_rs::types::basic::BlockHeight;
use commitflow_rs::types::block::Block;

/// A block loader that serves blocks from chains scripted per peer, standing in for the network
/// transport a production node would use.
#[derive(Clone)]
pub struct ScriptedLoader {
    chains: Arc<Mutex<HashMap<PublicKeyBytes, Vec<Arc<Block>>>>>,
}

impl ScriptedLoader {
    pub fn new() -> ScriptedLoader {
        ScriptedLoader {
            chains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Script `peer` to serve `chain`, which must hold the peer's committed blocks in height
    /// order.
    pub fn script(&self, peer: PublicKeyBytes, chain: Vec<Arc<Block>>) {
        self.chains.lock().unwrap().insert(peer, chain);
    }
}

impl BlockLoader for ScriptedLoader {
    fn retrieve_blocks(&self, peer: &PublicKeyBytes, from_height: BlockHeight) -> Vec<Arc<Block>> {
        match self.chains.lock().unwrap().get(peer) {
            Some(chain) => chain
                .iter()
                .filter(|block| block.height >= from_height)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// A block loader with no peers behind it. Nodes that never catch up can use this.
pub struct NullLoader;

impl BlockLoader for NullLoader {
    fn retrieve_blocks(
        &self,
        _peer: &PublicKeyBytes,
        _from_height: BlockHeight,
    ) -> Vec<Arc<Block>> {
        Vec::new()
    }
}
