//! Query handlers for the auction context.

use chrono::{DateTime, Utc};
use gavel_core::auction::AuctionRepository;
use gavel_core::error::DomainError;
use gavel_core::snapshot::RecordSnapshot;
use uuid::Uuid;

use crate::domain::mapping::{self, AuctionView};

/// Retrieves one auction.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no auction has the ID.
pub async fn get_auction_by_id(
    auction_id: Uuid,
    repo: &dyn AuctionRepository,
) -> Result<AuctionView, DomainError> {
    repo.find(auction_id)
        .await?
        .map(|record| mapping::to_view(&record))
        .ok_or(DomainError::NotFound(auction_id))
}

/// Lists auctions changed strictly after `since` (all when `None`), ordered
/// by make.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store is unreachable.
pub async fn list_auctions(
    since: Option<DateTime<Utc>>,
    repo: &dyn AuctionRepository,
) -> Result<Vec<AuctionView>, DomainError> {
    Ok(repo
        .updated_since(since)
        .await?
        .iter()
        .map(mapping::to_view)
        .collect())
}

/// Serves the reconciliation pull: every auction changed strictly after
/// `since`, as snapshots.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store is unreachable.
pub async fn records_updated_since(
    since: Option<DateTime<Utc>>,
    repo: &dyn AuctionRepository,
) -> Result<Vec<RecordSnapshot>, DomainError> {
    Ok(repo
        .updated_since(since)
        .await?
        .iter()
        .map(mapping::to_snapshot)
        .collect())
}
