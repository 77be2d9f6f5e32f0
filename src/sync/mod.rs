/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Chain synchronization: the synchronizer thread that turns consensus outcomes into committed
//! ledger state, the peer catch-up machinery it falls back on when a commit arrives ahead of the
//! local chain, and the serving side that answers other nodes' catch-up requests.

pub mod block_cache;

pub mod block_loader;

pub mod block_server;

pub mod synchronizer;
