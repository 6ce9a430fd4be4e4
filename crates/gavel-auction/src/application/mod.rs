//! Command handlers, queries and background tasks for the auction context.

pub mod command_handlers;
pub mod fault_router;
pub mod query_handlers;
pub mod relay;
