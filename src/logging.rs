/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the node's
//! [config](crate::node::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [PackProposal](crate::events::PackProposalEvent) is printed:
//!
//! ```text
//! PackProposal, 1701329264, 12, 1, 7
//! ```
//!
//! In the snippet:
//! - The third and fourth values are the block round and reject round of the round the proposal
//!   was packed for.
//! - The fifth value is the number of transactions in the proposal.

use crate::events::*;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;
use std::time::SystemTime;

// Names of each event in PascalCase for printing:
pub const RECEIVE_TRANSACTIONS: &str = "ReceiveTransactions";
pub const PACK_PROPOSAL: &str = "PackProposal";
pub const EVICT_PROPOSAL: &str = "EvictProposal";
pub const START_ROUND: &str = "StartRound";

pub const COMMIT_CHAIN: &str = "CommitChain";
pub const EMPTY_COMMIT: &str = "EmptyCommit";
pub const APPLY_BLOCK_FAILED: &str = "ApplyBlockFailed";
pub const SKIP_OUTCOME: &str = "SkipOutcome";

pub const START_CATCH_UP: &str = "StartCatchUp";
pub const END_CATCH_UP: &str = "EndCatchUp";
pub const RECEIVE_BLOCKS_REQUEST: &str = "ReceiveBlocksRequest";
pub const SEND_BLOCKS_RESPONSE: &str = "SendBlocksResponse";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ReceiveTransactionsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_transactions_event: &ReceiveTransactionsEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_TRANSACTIONS,
                secs_since_unix_epoch(receive_transactions_event.timestamp),
                receive_transactions_event.round.block_round,
                receive_transactions_event.round.reject_round,
                receive_transactions_event.count
            )
        };
        Box::new(logger)
    }
}

impl Logger for PackProposalEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |pack_proposal_event: &PackProposalEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                PACK_PROPOSAL,
                secs_since_unix_epoch(pack_proposal_event.timestamp),
                pack_proposal_event.round.block_round,
                pack_proposal_event.round.reject_round,
                pack_proposal_event.proposal.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for EvictProposalEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |evict_proposal_event: &EvictProposalEvent| {
            log::info!(
                "{}, {}, {}, {}",
                EVICT_PROPOSAL,
                secs_since_unix_epoch(evict_proposal_event.timestamp),
                evict_proposal_event.round.block_round,
                evict_proposal_event.round.reject_round
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_round_event: &StartRoundEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_ROUND,
                secs_since_unix_epoch(start_round_event.timestamp),
                start_round_event.round.block_round,
                start_round_event.round.reject_round
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitChainEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_chain_event: &CommitChainEvent| {
            let top = commit_chain_event
                .blocks
                .last()
                .map(|block| first_seven_base64_chars(&block.hash.bytes()))
                .unwrap_or_default();
            log::info!(
                "{}, {}, {}, {}",
                COMMIT_CHAIN,
                secs_since_unix_epoch(commit_chain_event.timestamp),
                commit_chain_event.blocks.len(),
                top
            )
        };
        Box::new(logger)
    }
}

impl Logger for EmptyCommitEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |empty_commit_event: &EmptyCommitEvent| {
            log::info!(
                "{}, {}, {}, {}",
                EMPTY_COMMIT,
                secs_since_unix_epoch(empty_commit_event.timestamp),
                first_seven_base64_chars(&empty_commit_event.block.bytes()),
                empty_commit_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for ApplyBlockFailedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |apply_block_failed_event: &ApplyBlockFailedEvent| {
            log::error!(
                "{}, {}, {}, {}",
                APPLY_BLOCK_FAILED,
                secs_since_unix_epoch(apply_block_failed_event.timestamp),
                first_seven_base64_chars(&apply_block_failed_event.block.bytes()),
                apply_block_failed_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for SkipOutcomeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |skip_outcome_event: &SkipOutcomeEvent| {
            log::error!(
                "{}, {}, {}, {}",
                SKIP_OUTCOME,
                secs_since_unix_epoch(skip_outcome_event.timestamp),
                first_seven_base64_chars(&skip_outcome_event.block.bytes()),
                skip_outcome_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartCatchUpEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_catch_up_event: &StartCatchUpEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_CATCH_UP,
                secs_since_unix_epoch(start_catch_up_event.timestamp),
                start_catch_up_event.target_height,
                first_seven_base64_chars(&start_catch_up_event.target_hash.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for EndCatchUpEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |end_catch_up_event: &EndCatchUpEvent| {
            log::info!(
                "{}, {}, {}",
                END_CATCH_UP,
                secs_since_unix_epoch(end_catch_up_event.timestamp),
                end_catch_up_event.blocks_applied
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBlocksRequestEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_blocks_request_event: &ReceiveBlocksRequestEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_BLOCKS_REQUEST,
                secs_since_unix_epoch(receive_blocks_request_event.timestamp),
                first_seven_base64_chars(&receive_blocks_request_event.peer),
                receive_blocks_request_event.start_height
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendBlocksResponseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |send_blocks_response_event: &SendBlocksResponseEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SEND_BLOCKS_RESPONSE,
                secs_since_unix_epoch(send_blocks_response_event.timestamp),
                first_seven_base64_chars(&send_blocks_response_event.peer),
                send_blocks_response_event.blocks.len()
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
