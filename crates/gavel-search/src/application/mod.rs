//! Event dispatch, startup reconciliation and search queries.

pub mod dispatcher;
pub mod query_handlers;
pub mod reconciler;
