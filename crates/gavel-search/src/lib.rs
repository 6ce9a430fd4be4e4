//! Gavel: derived search context.
//!
//! Keeps a search projection of auctions eventually consistent with the
//! auction service: the dispatcher applies bus events idempotently, the
//! reconciler backfills from the auction service at startup, and the query
//! handler serves searches over the projection.

pub mod application;
pub mod domain;
pub mod infrastructure;
