//! Routes for the search service.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;

use gavel_core::search::{SearchPage, SearchQuery};
use gavel_search::application::query_handlers;

use crate::error::ApiError;
use crate::state::SearchState;

/// GET /api/search
#[instrument(skip(state))]
async fn search(
    State(state): State<SearchState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>, ApiError> {
    let page = query_handlers::search(&query, state.clock.as_ref(), &*state.store).await?;
    Ok(Json(page))
}

/// Returns the router for the search endpoint.
pub fn router() -> Router<SearchState> {
    Router::new().route("/api/search", get(search))
}
