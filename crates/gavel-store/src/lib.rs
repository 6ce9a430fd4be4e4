//! Gavel: `PostgreSQL` persistence.
//!
//! `PgAuctionStore` holds authoritative auctions and their outbox in one
//! database so a mutation and its event commit together. `PgSearchStore`
//! holds the search projection.

pub mod pg_auction_store;
pub mod pg_search_store;
pub mod schema;

pub use pg_auction_store::PgAuctionStore;
pub use pg_search_store::PgSearchStore;
