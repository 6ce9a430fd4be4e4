//! `PostgreSQL` implementation of `OutboxStore` and `AuctionRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use gavel_core::auction::{AuctionRecord, AuctionRepository};
use gavel_core::error::DomainError;
use gavel_core::event::DomainEvent;
use gavel_core::outbox::{OutboxEntry, OutboxStore, StateChange};

#[derive(Debug, sqlx::FromRow)]
struct AuctionRow {
    id: Uuid,
    make: String,
    model: String,
    color: String,
    mileage: i32,
    year: i32,
    seller: String,
    winner: Option<String>,
    auction_end: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AuctionRow> for AuctionRecord {
    fn from(row: AuctionRow) -> Self {
        Self {
            id: row.id,
            make: row.make,
            model: row.model,
            color: row.color,
            mileage: row.mileage,
            year: row.year,
            seller: row.seller,
            winner: row.winner,
            auction_end: row.auction_end,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    sequence: i64,
    entry_id: Uuid,
    payload: serde_json::Value,
    pending: bool,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let event: DomainEvent = serde_json::from_value(row.payload).map_err(|e| {
            DomainError::Infrastructure(format!(
                "outbox entry {} payload undecodable: {e}",
                row.sequence
            ))
        })?;
        Ok(Self {
            entry_id: row.entry_id,
            sequence: row.sequence,
            event,
            pending: row.pending,
            created_at: row.created_at,
            sent_at: row.sent_at,
        })
    }
}

const AUCTION_COLUMNS: &str = "id, make, model, color, mileage, year, seller, winner, \
                               auction_end, created_at, updated_at";

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// Maps a failed write inside the mutation transaction. Constraint
/// violations abort the transaction; anything else is infrastructure.
fn write_failed(err: sqlx::Error) -> DomainError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            DomainError::TransactionAborted(db.message().to_owned())
        }
        _ => infrastructure(err),
    }
}

/// PostgreSQL-backed auction store. Auctions and their outbox live in the
/// same database.
#[derive(Debug, Clone)]
pub struct PgAuctionStore {
    pool: PgPool,
}

impl PgAuctionStore {
    /// Creates a new `PgAuctionStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply_change(
        tx: &mut Transaction<'_, Postgres>,
        change: &StateChange,
    ) -> Result<(), DomainError> {
        let affected = match change {
            StateChange::Insert(record) => sqlx::query(
                "INSERT INTO auctions (id, make, model, color, mileage, year, seller, winner, \
                 auction_end, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(record.id)
            .bind(&record.make)
            .bind(&record.model)
            .bind(&record.color)
            .bind(record.mileage)
            .bind(record.year)
            .bind(&record.seller)
            .bind(&record.winner)
            .bind(record.auction_end)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(write_failed)?
            .rows_affected(),
            StateChange::Update {
                record,
                expected_updated_at,
            } => sqlx::query(
                "UPDATE auctions SET make = $2, model = $3, color = $4, mileage = $5, \
                 year = $6, seller = $7, winner = $8, auction_end = $9, updated_at = $10 \
                 WHERE id = $1 AND updated_at = $11",
            )
            .bind(record.id)
            .bind(&record.make)
            .bind(&record.model)
            .bind(&record.color)
            .bind(record.mileage)
            .bind(record.year)
            .bind(&record.seller)
            .bind(&record.winner)
            .bind(record.auction_end)
            .bind(record.updated_at)
            .bind(expected_updated_at)
            .execute(&mut **tx)
            .await
            .map_err(write_failed)?
            .rows_affected(),
            StateChange::Delete(id) => sqlx::query("DELETE FROM auctions WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(write_failed)?
                .rows_affected(),
        };

        if affected == 0 {
            let reason = match change {
                StateChange::Update { .. } => "does not exist or was changed concurrently",
                _ => "does not exist",
            };
            return Err(DomainError::TransactionAborted(format!(
                "auction {} {reason}",
                change.entity_id()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PgAuctionStore {
    async fn record_mutation(
        &self,
        change: StateChange,
        event: DomainEvent,
        at: DateTime<Utc>,
    ) -> Result<OutboxEntry, DomainError> {
        let payload = serde_json::to_value(&event)
            .map_err(|e| DomainError::Infrastructure(format!("event not encodable: {e}")))?;
        let entry_id = Uuid::now_v7();

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        // Dropping `tx` on an early return rolls back the mutation.
        Self::apply_change(&mut tx, &change).await?;

        let sequence: i64 = sqlx::query_scalar(
            "INSERT INTO outbox_entries (entry_id, entity_id, kind, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING sequence",
        )
        .bind(entry_id)
        .bind(event.entity_id())
        .bind(event.kind().as_str())
        .bind(&payload)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_failed)?;

        tx.commit().await.map_err(infrastructure)?;
        debug!(sequence, entity_id = %event.entity_id(), kind = %event.kind(), "mutation committed");

        Ok(OutboxEntry {
            entry_id,
            sequence,
            event,
            pending: true,
            created_at: at,
            sent_at: None,
        })
    }

    async fn pending_entries(&self, limit: i64) -> Result<Vec<OutboxEntry>, DomainError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT sequence, entry_id, payload, pending, created_at, sent_at \
             FROM outbox_entries WHERE pending ORDER BY sequence LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    async fn mark_sent(&self, sequence: i64, at: DateTime<Utc>) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE outbox_entries SET pending = FALSE, sent_at = COALESCE(sent_at, $2) \
             WHERE sequence = $1",
        )
        .bind(sequence)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }
}

#[async_trait]
impl AuctionRepository for PgAuctionStore {
    async fn find(&self, id: Uuid) -> Result<Option<AuctionRecord>, DomainError> {
        let row: Option<AuctionRow> =
            sqlx::query_as(&format!("SELECT {AUCTION_COLUMNS} FROM auctions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(infrastructure)?;
        Ok(row.map(AuctionRecord::from))
    }

    async fn updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuctionRecord>, DomainError> {
        let rows: Vec<AuctionRow> = sqlx::query_as(&format!(
            "SELECT {AUCTION_COLUMNS} FROM auctions \
             WHERE $1::timestamptz IS NULL OR updated_at > $1 \
             ORDER BY make COLLATE \"C\", id"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(rows.into_iter().map(AuctionRecord::from).collect())
    }
}
