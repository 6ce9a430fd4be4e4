//! `PostgreSQL` implementation of `DerivedStore`.
//!
//! Searches render the query's filter and order options to SQL with
//! `QueryBuilder`, evaluated against the caller's `now` rather than the
//! database clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use gavel_core::derived::{DerivedRecord, DerivedStore, FieldPatch, PatchOutcome};
use gavel_core::error::DomainError;
use gavel_core::search::{ENDING_SOON_WINDOW_HOURS, FilterBy, OrderBy, SearchPage, SearchQuery};

#[derive(Debug, sqlx::FromRow)]
struct SearchRow {
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

impl From<SearchRow> for DerivedRecord {
    fn from(row: SearchRow) -> Self {
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

const COLUMNS: &str = "id, make, model, color, mileage, year, seller, winner, \
                       auction_end, created_at, updated_at";

const INSERT: &str = "INSERT INTO search_items (id, make, model, color, mileage, year, seller, \
                      winner, auction_end, created_at, updated_at) \
                      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_predicates(builder: &mut QueryBuilder<'_, Postgres>, query: &SearchQuery, now: DateTime<Utc>) {
    builder.push(" WHERE TRUE");

    if let Some(term) = query.normalized_term() {
        let pattern = like_pattern(&term);
        builder
            .push(" AND (make ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR model ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR color ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(seller) = &query.seller {
        builder.push(" AND seller = ").push_bind(seller.clone());
    }
    if let Some(winner) = &query.winner {
        builder.push(" AND winner = ").push_bind(winner.clone());
    }

    match query.filter_by {
        FilterBy::Finished => {
            builder.push(" AND auction_end < ").push_bind(now);
        }
        FilterBy::EndingSoon => {
            builder
                .push(" AND auction_end > ")
                .push_bind(now)
                .push(" AND auction_end < ")
                .push_bind(now + Duration::hours(ENDING_SOON_WINDOW_HOURS));
        }
        FilterBy::Live => {
            builder.push(" AND auction_end > ").push_bind(now);
        }
    }
}

fn order_clause(order: OrderBy) -> &'static str {
    match order {
        OrderBy::Make => " ORDER BY make COLLATE \"C\" ASC, id ASC",
        OrderBy::New => " ORDER BY created_at DESC, id ASC",
        OrderBy::AuctionEnd => " ORDER BY auction_end ASC, id ASC",
    }
}

/// PostgreSQL-backed search projection.
#[derive(Debug, Clone)]
pub struct PgSearchStore {
    pool: PgPool,
}

impl PgSearchStore {
    /// Creates a new `PgSearchStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DerivedStore for PgSearchStore {
    async fn find(&self, id: Uuid) -> Result<Option<DerivedRecord>, DomainError> {
        let row: Option<SearchRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM search_items WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(infrastructure)?;
        Ok(row.map(DerivedRecord::from))
    }

    async fn insert_if_absent(&self, record: &DerivedRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(&format!("{INSERT} ON CONFLICT (id) DO NOTHING"))
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
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected() == 1)
    }

    async fn apply_patch(
        &self,
        id: Uuid,
        patch: &FieldPatch,
    ) -> Result<PatchOutcome, DomainError> {
        let result = sqlx::query(
            "UPDATE search_items SET \
             make = COALESCE($2, make), \
             model = COALESCE($3, model), \
             color = COALESCE($4, color), \
             mileage = COALESCE($5, mileage), \
             year = COALESCE($6, year), \
             updated_at = GREATEST(updated_at, COALESCE($7, updated_at)) \
             WHERE id = $1 AND ($7::timestamptz IS NULL OR updated_at <= $7)",
        )
        .bind(id)
        .bind(&patch.make)
        .bind(&patch.model)
        .bind(&patch.color)
        .bind(patch.mileage)
        .bind(patch.year)
        .bind(patch.updated_at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        if result.rows_affected() > 0 {
            return Ok(PatchOutcome::Applied);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM search_items WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(infrastructure)?;
        Ok(if exists {
            PatchOutcome::Stale
        } else {
            PatchOutcome::Missing
        })
    }

    async fn remove(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM search_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected() > 0)
    }

    async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DomainError> {
        sqlx::query_scalar("SELECT MAX(updated_at) FROM search_items")
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure)
    }

    async fn upsert_all(&self, records: &[DerivedRecord]) -> Result<usize, DomainError> {
        let sql = format!(
            "{INSERT} ON CONFLICT (id) DO UPDATE SET \
             make = EXCLUDED.make, model = EXCLUDED.model, color = EXCLUDED.color, \
             mileage = EXCLUDED.mileage, year = EXCLUDED.year, seller = EXCLUDED.seller, \
             winner = EXCLUDED.winner, auction_end = EXCLUDED.auction_end, \
             created_at = EXCLUDED.created_at, updated_at = EXCLUDED.updated_at"
        );

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        for record in records {
            sqlx::query(&sql)
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
                .execute(&mut *tx)
                .await
                .map_err(infrastructure)?;
        }
        tx.commit().await.map_err(infrastructure)?;
        Ok(records.len())
    }

    async fn search(
        &self,
        query: &SearchQuery,
        now: DateTime<Utc>,
    ) -> Result<SearchPage, DomainError> {
        let page_size = query.effective_page_size();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM search_items");
        push_predicates(&mut count, query, now);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM search_items"));
        push_predicates(&mut select, query, now);
        select
            .push(order_clause(query.order_by))
            .push(" LIMIT ")
            .push_bind(i64::try_from(page_size).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
        let rows: Vec<SearchRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;

        Ok(SearchPage::new(
            rows.into_iter().map(DerivedRecord::from).collect(),
            usize::try_from(total).unwrap_or(0),
            page_size,
        ))
    }
}
