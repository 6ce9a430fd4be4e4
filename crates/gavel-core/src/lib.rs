//! Gavel Core: shared abstractions for the auction → search pipeline.
//!
//! This crate defines the events, records, ports and error taxonomy that the
//! authoritative auction service and the derived search service agree on. It
//! contains no infrastructure code.

pub mod auction;
pub mod bus;
pub mod clock;
pub mod config;
pub mod derived;
pub mod error;
pub mod event;
pub mod fault;
pub mod outbox;
pub mod search;
pub mod snapshot;
