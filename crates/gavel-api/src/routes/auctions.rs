//! Routes for the authoritative auction service.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use gavel_auction::application::{command_handlers, query_handlers};
use gavel_auction::domain::commands::{CreateAuction, DeleteAuction, UpdateAuction};
use gavel_auction::domain::mapping::{self, AuctionView};
use gavel_core::snapshot::RecordSnapshot;

use crate::error::ApiError;
use crate::state::AuctionState;

/// Query string for GET /api/auctions.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Only auctions changed strictly after this instant.
    pub date: Option<DateTime<Utc>>,
}

/// Query string for GET /records.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsParams {
    /// Only auctions changed strictly after this instant.
    pub updated_since: Option<DateTime<Utc>>,
}

/// POST /api/auctions
#[instrument(skip(state, command), fields(correlation_id = %command.correlation_id))]
async fn create_auction(
    State(state): State<AuctionState>,
    Json(command): Json<CreateAuction>,
) -> Result<(StatusCode, Json<AuctionView>), ApiError> {
    info!("handling create_auction command");

    let record =
        command_handlers::handle_create_auction(&command, state.clock.as_ref(), &*state.outbox)
            .await?;

    Ok((StatusCode::CREATED, Json(mapping::to_view(&record))))
}

/// GET /api/auctions
#[instrument(skip(state))]
async fn list_auctions(
    State(state): State<AuctionState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AuctionView>>, ApiError> {
    let views = query_handlers::list_auctions(params.date, &*state.auctions).await?;
    Ok(Json(views))
}

/// GET /api/auctions/{id}
#[instrument(skip(state))]
async fn get_auction(
    State(state): State<AuctionState>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<AuctionView>, ApiError> {
    let view = query_handlers::get_auction_by_id(auction_id, &*state.auctions).await?;
    Ok(Json(view))
}

/// PUT /api/auctions/{id}
#[instrument(skip(state, command), fields(correlation_id = %command.correlation_id))]
async fn update_auction(
    State(state): State<AuctionState>,
    Path(auction_id): Path<Uuid>,
    Json(command): Json<UpdateAuction>,
) -> Result<Json<AuctionView>, ApiError> {
    let command = UpdateAuction {
        auction_id,
        ..command
    };
    info!("handling update_auction command");

    let record = command_handlers::handle_update_auction(
        &command,
        state.clock.as_ref(),
        &*state.auctions,
        &*state.outbox,
    )
    .await?;

    Ok(Json(mapping::to_view(&record)))
}

/// DELETE /api/auctions/{id}
#[instrument(skip(state))]
async fn delete_auction(
    State(state): State<AuctionState>,
    Path(auction_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let command = DeleteAuction {
        correlation_id: Uuid::new_v4(),
        auction_id,
    };
    info!(correlation_id = %command.correlation_id, "handling delete_auction command");

    command_handlers::handle_delete_auction(
        &command,
        state.clock.as_ref(),
        &*state.auctions,
        &*state.outbox,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /records
#[instrument(skip(state))]
async fn records(
    State(state): State<AuctionState>,
    Query(params): Query<RecordsParams>,
) -> Result<Json<Vec<RecordSnapshot>>, ApiError> {
    let snapshots =
        query_handlers::records_updated_since(params.updated_since, &*state.auctions).await?;
    info!(count = snapshots.len(), "serving reconciliation pull");
    Ok(Json(snapshots))
}

/// Returns the router for the auction service's endpoints.
pub fn router() -> Router<AuctionState> {
    Router::new()
        .route("/api/auctions", get(list_auctions).post(create_auction))
        .route(
            "/api/auctions/{id}",
            get(get_auction).put(update_auction).delete(delete_auction),
        )
        .route("/records", get(records))
}
