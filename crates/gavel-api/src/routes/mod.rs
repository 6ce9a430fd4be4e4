//! Route modules and the per-service application routers.

use axum::Router;
use gavel_bus::topology::{AUCTION_SERVICE, SEARCH_SERVICE};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::{AuctionState, SearchState};

pub mod auctions;
pub mod health;
pub mod search;

/// The auction service's full router.
pub fn auction_app(state: AuctionState) -> Router {
    Router::new()
        .merge(health::router(AUCTION_SERVICE))
        .merge(auctions::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The search service's full router.
pub fn search_app(state: SearchState) -> Router {
    Router::new()
        .merge(health::router(SEARCH_SERVICE))
        .merge(search::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
