/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::events::*;
use crate::logging::Logger;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::thread::JoinHandle;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) receive_transactions_handlers: Vec<HandlerPtr<ReceiveTransactionsEvent>>,
    pub(crate) pack_proposal_handlers: Vec<HandlerPtr<PackProposalEvent>>,
    pub(crate) evict_proposal_handlers: Vec<HandlerPtr<EvictProposalEvent>>,
    pub(crate) start_round_handlers: Vec<HandlerPtr<StartRoundEvent>>,
    pub(crate) commit_chain_handlers: Vec<HandlerPtr<CommitChainEvent>>,
    pub(crate) empty_commit_handlers: Vec<HandlerPtr<EmptyCommitEvent>>,
    pub(crate) apply_block_failed_handlers: Vec<HandlerPtr<ApplyBlockFailedEvent>>,
    pub(crate) skip_outcome_handlers: Vec<HandlerPtr<SkipOutcomeEvent>>,
    pub(crate) start_catch_up_handlers: Vec<HandlerPtr<StartCatchUpEvent>>,
    pub(crate) end_catch_up_handlers: Vec<HandlerPtr<EndCatchUpEvent>>,
    pub(crate) receive_blocks_request_handlers: Vec<HandlerPtr<ReceiveBlocksRequestEvent>>,
    pub(crate) send_blocks_response_handlers: Vec<HandlerPtr<SendBlocksResponseEvent>>,
}

impl EventHandlers {

    pub(crate) fn new(
        log_events: bool,
        on_receive_transactions: Option<HandlerPtr<ReceiveTransactionsEvent>>,
        on_pack_proposal: Option<HandlerPtr<PackProposalEvent>>,
        on_evict_proposal: Option<HandlerPtr<EvictProposalEvent>>,
        on_start_round: Option<HandlerPtr<StartRoundEvent>>,
        on_commit_chain: Option<HandlerPtr<CommitChainEvent>>,
        on_empty_commit: Option<HandlerPtr<EmptyCommitEvent>>,
        on_apply_block_failed: Option<HandlerPtr<ApplyBlockFailedEvent>>,
        on_skip_outcome: Option<HandlerPtr<SkipOutcomeEvent>>,
        on_start_catch_up: Option<HandlerPtr<StartCatchUpEvent>>,
        on_end_catch_up: Option<HandlerPtr<EndCatchUpEvent>>,
        on_receive_blocks_request: Option<HandlerPtr<ReceiveBlocksRequestEvent>>,
        on_send_blocks_response: Option<HandlerPtr<SendBlocksResponseEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, registered: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger())
            }
            if let Some(registered) = registered {
                handlers.push(registered)
            }
            handlers
        }

        EventHandlers {
            receive_transactions_handlers: handlers(log_events, on_receive_transactions),
            pack_proposal_handlers: handlers(log_events, on_pack_proposal),
            evict_proposal_handlers: handlers(log_events, on_evict_proposal),
            start_round_handlers: handlers(log_events, on_start_round),
            commit_chain_handlers: handlers(log_events, on_commit_chain),
            empty_commit_handlers: handlers(log_events, on_empty_commit),
            apply_block_failed_handlers: handlers(log_events, on_apply_block_failed),
            skip_outcome_handlers: handlers(log_events, on_skip_outcome),
            start_catch_up_handlers: handlers(log_events, on_start_catch_up),
            end_catch_up_handlers: handlers(log_events, on_end_catch_up),
            receive_blocks_request_handlers: handlers(log_events, on_receive_blocks_request),
            send_blocks_response_handlers: handlers(log_events, on_send_blocks_response),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receive_transactions_handlers.is_empty()
            && self.pack_proposal_handlers.is_empty()
            && self.evict_proposal_handlers.is_empty()
            && self.start_round_handlers.is_empty()
            && self.commit_chain_handlers.is_empty()
            && self.empty_commit_handlers.is_empty()
            && self.apply_block_failed_handlers.is_empty()
            && self.skip_outcome_handlers.is_empty()
            && self.start_catch_up_handlers.is_empty()
            && self.end_catch_up_handlers.is_empty()
            && self.receive_blocks_request_handlers.is_empty()
            && self.send_blocks_response_handlers.is_empty()
    }

    pub fn fire_handlers(&self, event: Event) {
        match event {
            Event::ReceiveTransactions(receive_transactions_event) =>
                self.receive_transactions_handlers.iter().for_each(|handler| handler(&receive_transactions_event)),

            Event::PackProposal(pack_proposal_event) =>
                self.pack_proposal_handlers.iter().for_each(|handler| handler(&pack_proposal_event)),

            Event::EvictProposal(evict_proposal_event) =>
                self.evict_proposal_handlers.iter().for_each(|handler| handler(&evict_proposal_event)),

            Event::StartRound(start_round_event) =>
                self.start_round_handlers.iter().for_each(|handler| handler(&start_round_event)),

            Event::CommitChain(commit_chain_event) =>
                self.commit_chain_handlers.iter().for_each(|handler| handler(&commit_chain_event)),

            Event::EmptyCommit(empty_commit_event) =>
                self.empty_commit_handlers.iter().for_each(|handler| handler(&empty_commit_event)),

            Event::ApplyBlockFailed(apply_block_failed_event) =>
                self.apply_block_failed_handlers.iter().for_each(|handler| handler(&apply_block_failed_event)),

            Event::SkipOutcome(skip_outcome_event) =>
                self.skip_outcome_handlers.iter().for_each(|handler| handler(&skip_outcome_event)),

            Event::StartCatchUp(start_catch_up_event) =>
                self.start_catch_up_handlers.iter().for_each(|handler| handler(&start_catch_up_event)),

            Event::EndCatchUp(end_catch_up_event) =>
                self.end_catch_up_handlers.iter().for_each(|handler| handler(&end_catch_up_event)),

            Event::ReceiveBlocksRequest(receive_blocks_request_event) =>
                self.receive_blocks_request_handlers.iter().for_each(|handler| handler(&receive_blocks_request_event)),

            Event::SendBlocksResponse(send_blocks_response_event) =>
                self.send_blocks_response_handlers.iter().for_each(|handler| handler(&send_blocks_response_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        if let Ok(event) = event_subscriber.try_recv() {
            (&event_handlers).fire_handlers(event)
        } else if let Err(TryRecvError::Disconnected) = event_subscriber.try_recv() {
            panic!("The synchronizer thread (event publisher) was disconnected from the channel")
        }

    })
}
