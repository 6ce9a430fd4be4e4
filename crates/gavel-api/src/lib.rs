//! Gavel: HTTP surface and process wiring for the auction and search
//! services.

pub mod error;
pub mod routes;
pub mod settings;
pub mod shutdown;
pub mod state;
pub mod telemetry;
