//! Commands and pure mappings for the auction context.

pub mod commands;
pub mod mapping;
