/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each ledger state variable is stored in the user-provided
//! key-value store.
//!
//! Every stored value lives under a single-byte prefix followed by the borsh encoding of its
//! identifier. Borsh length-prefixes strings, so concatenated keys are prefix-free.

pub(crate) const ACCOUNTS: [u8; 1] = [0];
pub(crate) const ACCOUNT_SIGNATORIES: [u8; 1] = [1];
pub(crate) const ACCOUNT_GRANTS: [u8; 1] = [2];
pub(crate) const ACCOUNT_BALANCES: [u8; 1] = [3];
pub(crate) const DOMAINS: [u8; 1] = [4];
pub(crate) const ASSETS: [u8; 1] = [5];
pub(crate) const ROLES: [u8; 1] = [6];
pub(crate) const PEERS: [u8; 1] = [7];
pub(crate) const BLOCKS: [u8; 1] = [8];
pub(crate) const BLOCK_AT_HEIGHT: [u8; 1] = [9];
pub(crate) const TOP_HASH: [u8; 1] = [10];
pub(crate) const CHAIN_HEIGHT: [u8; 1] = [11];

/// Concatenate two key segments.
pub(crate) fn combine(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(a.len() + b.len());
    key.extend_from_slice(a);
    key.extend_from_slice(b);
    key
}
