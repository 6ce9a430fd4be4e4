//! Gavel: authoritative auction context.
//!
//! Owns auction state and its transactional outbox: command handlers mutate
//! an auction and enqueue the matching event in one transaction, the relay
//! moves pending entries onto the bus, and the fault router compensates for
//! events the search service could not apply.

pub mod application;
pub mod domain;
