/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Logging setup for the integration tests.

use std::io;
use std::sync::Once;
use std::thread;

static LOGGER_INIT: Once = Once::new();

/// Set up a logger that logs all log messages with level `level` and above. A thread can call
/// `setup_logger` multiple times in a single run without issue, but only the first call will have
/// an effect.
pub fn setup_logger(level: log::LevelFilter) {
    LOGGER_INIT.call_once(|| {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{:?}][{}] {}",
                    thread::current().id(),
                    record.level(),
                    message
                ))
            })
            .level(level)
            .chain(io::stdout())
            .apply()
            .unwrap()
    })
}
