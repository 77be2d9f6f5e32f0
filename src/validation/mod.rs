/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Validation at the two points where untrusted input meets ledger state: the chain validator
//! checks that candidate blocks extend the committed chain, and stateful validation sieves a
//! proposal's transactions against the current world state.

pub mod chain;

pub mod stateful;
