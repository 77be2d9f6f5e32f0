/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

// Not every integration test exercises every helper.
#![allow(dead_code)]

pub mod fixtures;
pub mod loader;
pub mod logging;
pub mod mem_db;
