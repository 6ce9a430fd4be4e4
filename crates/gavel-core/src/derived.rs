//! The search-side projection and the ports that feed it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, ReconcileError};
use crate::search::{SearchPage, SearchQuery};
use crate::snapshot::RecordSnapshot;

/// One auction as indexed by the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRecord {
    /// Stable identifier, shared with the auction service.
    pub id: Uuid,
    /// Vehicle make.
    pub make: String,
    /// Vehicle model.
    pub model: String,
    /// Vehicle color.
    pub color: String,
    /// Odometer reading.
    pub mileage: i32,
    /// Model year.
    pub year: i32,
    /// Seller username.
    pub seller: String,
    /// Winner username, once known.
    pub winner: Option<String>,
    /// When bidding closes.
    pub auction_end: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Authoritative last-modified timestamp (watermark column).
    pub updated_at: DateTime<Utc>,
}

/// A partial update restricted to the mutable-field whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPatch {
    /// New make, if changed.
    pub make: Option<String>,
    /// New model, if changed.
    pub model: Option<String>,
    /// New color, if changed.
    pub color: Option<String>,
    /// New mileage, if changed.
    pub mileage: Option<i32>,
    /// New year, if changed.
    pub year: Option<i32>,
    /// Authoritative timestamp of the change.
    pub updated_at: Option<DateTime<Utc>>,
}

/// What merging a patch into a stored record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The patch was merged.
    Applied,
    /// The record changed after the patch was produced; nothing was written.
    Stale,
    /// No record with that id exists.
    Missing,
}

impl FieldPatch {
    /// Whether `record` already holds a later authoritative change.
    #[must_use]
    pub fn is_stale_for(&self, record: &DerivedRecord) -> bool {
        self.updated_at.is_some_and(|at| at < record.updated_at)
    }

    /// Merges the patch into `record`, returning `false` without touching it
    /// when the patch is stale.
    ///
    /// Absent fields are left alone and `updated_at` only moves forward, so
    /// merging the same patch twice is the same as merging it once, and a
    /// redelivered older patch never overwrites a newer one.
    pub fn merge_into(&self, record: &mut DerivedRecord) -> bool {
        if self.is_stale_for(record) {
            return false;
        }
        if let Some(make) = &self.make {
            record.make.clone_from(make);
        }
        if let Some(model) = &self.model {
            record.model.clone_from(model);
        }
        if let Some(color) = &self.color {
            record.color.clone_from(color);
        }
        if let Some(mileage) = self.mileage {
            record.mileage = mileage;
        }
        if let Some(year) = self.year {
            record.year = year;
        }
        if let Some(updated_at) = self.updated_at {
            record.updated_at = record.updated_at.max(updated_at);
        }
        true
    }
}

/// Store backing the search index.
#[async_trait]
pub trait DerivedStore: Send + Sync {
    /// Loads one record.
    async fn find(&self, id: Uuid) -> Result<Option<DerivedRecord>, DomainError>;

    /// Inserts `record` unless a record with the same id exists. Returns
    /// whether a row was inserted.
    async fn insert_if_absent(&self, record: &DerivedRecord) -> Result<bool, DomainError>;

    /// Merges `patch` into the record with `id` unless the record already
    /// carries a later `updated_at`.
    async fn apply_patch(&self, id: Uuid, patch: &FieldPatch)
    -> Result<PatchOutcome, DomainError>;

    /// Removes the record with `id`. Returns whether it existed.
    async fn remove(&self, id: Uuid) -> Result<bool, DomainError>;

    /// Returns `max(updated_at)` over all records, `None` when empty.
    async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DomainError>;

    /// Inserts or fully overwrites every record by id. Returns the number of
    /// records written.
    async fn upsert_all(&self, records: &[DerivedRecord]) -> Result<usize, DomainError>;

    /// Runs a search query evaluated at `now`.
    async fn search(
        &self,
        query: &SearchQuery,
        now: DateTime<Utc>,
    ) -> Result<SearchPage, DomainError>;
}

/// The authoritative service as seen by reconciliation.
#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    /// Fetches every record updated strictly after `since` (all when `None`).
    async fn records_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RecordSnapshot>, ReconcileError>;
}
