//! Database schema.
//!
//! Tables (`auctions`, `outbox_entries`, `search_items`, `bus_messages`) are
//! created by the SQL files under `migrations/`, embedded here so each
//! service can bring its database up to date at startup.

use sqlx::migrate::Migrator;

/// Embedded migrations for every Gavel table.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
