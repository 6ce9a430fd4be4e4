//! Adapters to the outside world.

pub mod auction_client;
