/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! On-demand transaction ordering: pending transactions are packed into round-indexed proposals
//! only when consensus asks for them.

pub mod service;

pub use service::{OnDemandOrderingService, RoundOutcome};
