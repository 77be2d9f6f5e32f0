/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Ledger state: pluggable key-value persistence, the typed world state view layered over it,
//! and the savepoint-backed mutable storage that is the only write path into the ledger.

pub mod kv_store;

pub mod mutable_storage;

pub(crate) mod paths;

pub mod write_set;

pub mod wsv;
