/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Structural chain validation: does this block actually extend the chain we have?

use std::sync::Arc;

use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::Block;

pub struct ChainValidator;

impl ChainValidator {
    /// Check whether `block` is a well-formed direct successor of the position described by
    /// `top_hash` and `height`.
    pub fn extends(block: &Block, top_hash: &CryptoHash, height: BlockHeight) -> bool {
        block.prev_hash == *top_hash
            && block.height == height + 1
            && !block.signatures.is_empty()
            && block.is_correct()
    }

    /// Check that `blocks` is a hash-linked sequence of well-formed blocks starting directly
    /// after the position described by `top_hash` and `height`.
    ///
    /// Purely structural. Whether each block's transactions actually execute against the ledger
    /// is only discovered when the block is applied.
    pub fn validate_chain(blocks: &[Arc<Block>], top_hash: &CryptoHash, height: BlockHeight) -> bool {
        let mut top_hash = *top_hash;
        let mut height = height;
        for block in blocks {
            if !ChainValidator::extends(block, &top_hash, height) {
                return false;
            }
            top_hash = block.hash;
            height = block.height;
        }
        true
    }
}
