//! Transactional outbox abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auction::AuctionRecord;
use crate::error::DomainError;
use crate::event::DomainEvent;

/// A write against authoritative auction state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// Insert a new auction; fails if the id already exists.
    Insert(AuctionRecord),
    /// Replace an existing auction; fails if it does not exist or its
    /// `updated_at` is no longer `expected_updated_at`.
    Update {
        /// The post-mutation record.
        record: AuctionRecord,
        /// `updated_at` of the version the change was computed from.
        expected_updated_at: DateTime<Utc>,
    },
    /// Remove an existing auction; fails if it does not exist.
    Delete(Uuid),
}

impl StateChange {
    /// Returns the id of the auction being written.
    #[must_use]
    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::Insert(record) | Self::Update { record, .. } => record.id,
            Self::Delete(id) => *id,
        }
    }
}

/// Stored representation of an outbox entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    /// Unique entry identifier.
    pub entry_id: Uuid,
    /// Store-wide monotonically increasing sequence; relay order.
    pub sequence: i64,
    /// The event to publish.
    pub event: DomainEvent,
    /// Whether the relay has yet to confirm publication.
    pub pending: bool,
    /// When the entry was written (same transaction as the mutation).
    pub created_at: DateTime<Utc>,
    /// When the relay confirmed publication.
    pub sent_at: Option<DateTime<Utc>>,
}

/// Store that owns authoritative state and its outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Applies `change` and appends `event` to the outbox atomically.
    ///
    /// Either both are committed or neither is; on failure the error is
    /// `DomainError::TransactionAborted` (constraint) or
    /// `DomainError::Infrastructure` (store unreachable).
    async fn record_mutation(
        &self,
        change: StateChange,
        event: DomainEvent,
        at: DateTime<Utc>,
    ) -> Result<OutboxEntry, DomainError>;

    /// Loads up to `limit` pending entries ordered by sequence.
    async fn pending_entries(&self, limit: i64) -> Result<Vec<OutboxEntry>, DomainError>;

    /// Flags an entry as published.
    async fn mark_sent(&self, sequence: i64, at: DateTime<Utc>) -> Result<(), DomainError>;
}
