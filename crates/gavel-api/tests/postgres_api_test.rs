//! API round trips against the `PostgreSQL` stores.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use gavel_api::routes;
use gavel_api::state::{AuctionState, SearchState};
use gavel_core::clock::SharedClock;
use gavel_core::outbox::OutboxStore;
use gavel_store::{PgAuctionStore, PgSearchStore};
use gavel_test_support::FixedClock;
use sqlx::PgPool;

use common::{create_body, get_json, now, send_json};

fn clock() -> SharedClock {
    Arc::new(FixedClock(now()))
}

fn auction_app(pool: PgPool) -> axum::Router {
    let store = Arc::new(PgAuctionStore::new(pool));
    routes::auction_app(AuctionState::new(clock(), store.clone(), store))
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_then_get_round_trip(pool: PgPool) {
    let (status, created) = send_json(
        auction_app(pool.clone()),
        "POST",
        "/api/auctions",
        &create_body("Ford", "F150", "Black"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (status, json) = get_json(auction_app(pool.clone()), &format!("/api/auctions/{id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model"], "F150");
    let pending = PgAuctionStore::new(pool).pending_entries(10).await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_records_endpoint_serves_snapshots(pool: PgPool) {
    send_json(
        auction_app(pool.clone()),
        "POST",
        "/api/auctions",
        &create_body("Ford", "F150", "Black"),
    )
    .await;

    let (status, json) = get_json(auction_app(pool.clone()), "/records").await;
    let (_, later) = get_json(auction_app(pool), "/records?updatedSince=2026-01-15T10:00:00Z").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["make"], "Ford");
    assert!(later.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_nonexistent_auction_returns_404(pool: PgPool) {
    let (status, json) = get_json(
        auction_app(pool),
        &format!("/api/auctions/{}", uuid::Uuid::new_v4()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "auction_not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_search_over_empty_projection(pool: PgPool) {
    let store = Arc::new(PgSearchStore::new(pool));
    let app = routes::search_app(SearchState::new(clock(), store));

    let (status, json) = get_json(app, "/api/search").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalCount"], 0);
    assert_eq!(json["pageCount"], 0);
}
