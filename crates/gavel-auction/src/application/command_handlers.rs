//! Command handlers for the auction context.
//!
//! Each handler builds the post-mutation record and its event, then hands
//! both to `OutboxStore::record_mutation` so the change and the outbox entry
//! commit together.

use gavel_core::auction::{AuctionRecord, AuctionRepository};
use gavel_core::clock::Clock;
use gavel_core::error::DomainError;
use gavel_core::outbox::{OutboxStore, StateChange};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::commands::{CreateAuction, DeleteAuction, UpdateAuction};
use crate::domain::mapping;

/// Handles the `CreateAuction` command: inserts the auction and enqueues its
/// `Created` event.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the command is rejected, or the
/// store's error if the transaction aborts.
#[instrument(skip(command, clock, store), fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_auction(
    command: &CreateAuction,
    clock: &dyn Clock,
    store: &dyn OutboxStore,
) -> Result<AuctionRecord, DomainError> {
    command.validate()?;

    let record = mapping::new_record(command, Uuid::now_v7(), clock.now());
    let event = mapping::created_event(&record);
    let entry = store
        .record_mutation(StateChange::Insert(record.clone()), event, record.created_at)
        .await?;

    info!(auction_id = %record.id, sequence = entry.sequence, "auction created");
    Ok(record)
}

/// Handles the `UpdateAuction` command: merges the present fields into the
/// auction and enqueues an `Updated` event carrying them.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the auction does not exist, or the
/// store's error if the transaction aborts.
#[instrument(
    skip(command, clock, repo, store),
    fields(correlation_id = %command.correlation_id, auction_id = %command.auction_id)
)]
pub async fn handle_update_auction(
    command: &UpdateAuction,
    clock: &dyn Clock,
    repo: &dyn AuctionRepository,
    store: &dyn OutboxStore,
) -> Result<AuctionRecord, DomainError> {
    let current = repo
        .find(command.auction_id)
        .await?
        .ok_or(DomainError::NotFound(command.auction_id))?;
    if command.is_empty() {
        return Ok(current);
    }

    let record = mapping::updated_record(&current, command, clock.now());
    let event = mapping::updated_event(&record, command);
    let entry = store
        .record_mutation(
            StateChange::Update {
                record: record.clone(),
                expected_updated_at: current.updated_at,
            },
            event,
            record.updated_at,
        )
        .await?;

    info!(sequence = entry.sequence, "auction updated");
    Ok(record)
}

/// Handles the `DeleteAuction` command: removes the auction and enqueues its
/// `Deleted` event.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the auction does not exist, or the
/// store's error if the transaction aborts.
#[instrument(
    skip(command, clock, repo, store),
    fields(correlation_id = %command.correlation_id, auction_id = %command.auction_id)
)]
pub async fn handle_delete_auction(
    command: &DeleteAuction,
    clock: &dyn Clock,
    repo: &dyn AuctionRepository,
    store: &dyn OutboxStore,
) -> Result<(), DomainError> {
    if repo.find(command.auction_id).await?.is_none() {
        return Err(DomainError::NotFound(command.auction_id));
    }

    let entry = store
        .record_mutation(
            StateChange::Delete(command.auction_id),
            mapping::deleted_event(command.auction_id),
            clock.now(),
        )
        .await?;

    info!(sequence = entry.sequence, "auction deleted");
    Ok(())
}
