/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple components of the commit pipeline.
//!
//! Types specific to a single component live with that component, e.g. the write sets in
//! [`crate::state`].

pub mod basic;

pub mod block;

pub mod identifiers;

pub mod transaction;
