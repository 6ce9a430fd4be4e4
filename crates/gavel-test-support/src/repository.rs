//! Test stores: in-memory `OutboxStore`, `AuctionRepository` and
//! `DerivedStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::auction::{AuctionRecord, AuctionRepository};
use gavel_core::derived::{DerivedRecord, DerivedStore, FieldPatch, PatchOutcome};
use gavel_core::error::DomainError;
use gavel_core::event::DomainEvent;
use gavel_core::outbox::{OutboxEntry, OutboxStore, StateChange};
use gavel_core::search::{SearchPage, SearchQuery};
use uuid::Uuid;

fn unavailable() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[derive(Debug, Default)]
struct AuctionState {
    auctions: HashMap<Uuid, AuctionRecord>,
    outbox: Vec<OutboxEntry>,
    last_sequence: i64,
}

/// An auction store that keeps auctions and their outbox in one map guarded
/// by one lock, so a mutation and its entry commit together or not at all.
#[derive(Debug, Default)]
pub struct InMemoryAuctionStore {
    state: Mutex<AuctionState>,
    unavailable: AtomicBool,
}

impl InMemoryAuctionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `auctions`, with an empty outbox.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_auctions(auctions: Vec<AuctionRecord>) -> Self {
        let store = Self::default();
        store
            .state
            .lock()
            .unwrap()
            .auctions
            .extend(auctions.into_iter().map(|a| (a.id, a)));
        store
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns a snapshot of every outbox entry, sent or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn outbox(&self) -> Vec<OutboxEntry> {
        self.state.lock().unwrap().outbox.clone()
    }

    /// Returns a snapshot of one stored auction.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn auction(&self, id: Uuid) -> Option<AuctionRecord> {
        self.state.lock().unwrap().auctions.get(&id).cloned()
    }

    /// Number of stored auctions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn auction_count(&self) -> usize {
        self.state.lock().unwrap().auctions.len()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryAuctionStore {
    async fn record_mutation(
        &self,
        change: StateChange,
        event: DomainEvent,
        at: DateTime<Utc>,
    ) -> Result<OutboxEntry, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();

        let id = change.entity_id();
        let exists = state.auctions.contains_key(&id);
        match (&change, exists) {
            (StateChange::Insert(_), true) => {
                return Err(DomainError::TransactionAborted(format!(
                    "auction {id} already exists"
                )));
            }
            (StateChange::Update { .. } | StateChange::Delete(_), false) => {
                return Err(DomainError::TransactionAborted(format!(
                    "auction {id} does not exist"
                )));
            }
            _ => {}
        }
        if let StateChange::Update {
            expected_updated_at,
            ..
        } = &change
        {
            if state.auctions.get(&id).map(|a| a.updated_at) != Some(*expected_updated_at) {
                return Err(DomainError::TransactionAborted(format!(
                    "auction {id} was changed concurrently"
                )));
            }
        }

        match change {
            StateChange::Insert(record) | StateChange::Update { record, .. } => {
                state.auctions.insert(record.id, record);
            }
            StateChange::Delete(id) => {
                state.auctions.remove(&id);
            }
        }

        state.last_sequence += 1;
        let entry = OutboxEntry {
            entry_id: Uuid::new_v4(),
            sequence: state.last_sequence,
            event,
            pending: true,
            created_at: at,
            sent_at: None,
        };
        state.outbox.push(entry.clone());
        Ok(entry)
    }

    async fn pending_entries(&self, limit: i64) -> Result<Vec<OutboxEntry>, DomainError> {
        self.check_available()?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .state
            .lock()
            .unwrap()
            .outbox
            .iter()
            .filter(|e| e.pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, sequence: i64, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.sequence == sequence) {
            entry.pending = false;
            entry.sent_at.get_or_insert(at);
        }
        Ok(())
    }
}

#[async_trait]
impl AuctionRepository for InMemoryAuctionStore {
    async fn find(&self, id: Uuid) -> Result<Option<AuctionRecord>, DomainError> {
        self.check_available()?;
        Ok(self.auction(id))
    }

    async fn updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuctionRecord>, DomainError> {
        self.check_available()?;
        let mut records: Vec<AuctionRecord> = self
            .state
            .lock()
            .unwrap()
            .auctions
            .values()
            .filter(|a| since.is_none_or(|s| a.updated_at > s))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.make.cmp(&b.make).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

/// A derived store backed by a map. Searches run the query in memory.
#[derive(Debug, Default)]
pub struct InMemorySearchStore {
    records: Mutex<HashMap<Uuid, DerivedRecord>>,
    unavailable: AtomicBool,
}

impl InMemorySearchStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `records`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_records(records: Vec<DerivedRecord>) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .unwrap()
            .extend(records.into_iter().map(|r| (r.id, r)));
        store
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns a snapshot of one record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, id: Uuid) -> Option<DerivedRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Number of stored records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DerivedStore for InMemorySearchStore {
    async fn find(&self, id: Uuid) -> Result<Option<DerivedRecord>, DomainError> {
        self.check_available()?;
        Ok(self.get(id))
    }

    async fn insert_if_absent(&self, record: &DerivedRecord) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.id) {
            return Ok(false);
        }
        records.insert(record.id, record.clone());
        Ok(true)
    }

    async fn apply_patch(
        &self,
        id: Uuid,
        patch: &FieldPatch,
    ) -> Result<PatchOutcome, DomainError> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        Ok(match records.get_mut(&id) {
            None => PatchOutcome::Missing,
            Some(record) => {
                if patch.merge_into(record) {
                    PatchOutcome::Applied
                } else {
                    PatchOutcome::Stale
                }
            }
        })
    }

    async fn remove(&self, id: Uuid) -> Result<bool, DomainError> {
        self.check_available()?;
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }

    async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DomainError> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .map(|r| r.updated_at)
            .max())
    }

    async fn upsert_all(&self, batch: &[DerivedRecord]) -> Result<usize, DomainError> {
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        for record in batch {
            records.insert(record.id, record.clone());
        }
        Ok(batch.len())
    }

    async fn search(
        &self,
        query: &SearchQuery,
        now: DateTime<Utc>,
    ) -> Result<SearchPage, DomainError> {
        self.check_available()?;
        let records: Vec<DerivedRecord> = self.records.lock().unwrap().values().cloned().collect();
        Ok(query.run(records, now))
    }
}

/// A derived store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingSearchStore;

#[async_trait]
impl DerivedStore for FailingSearchStore {
    async fn find(&self, _id: Uuid) -> Result<Option<DerivedRecord>, DomainError> {
        Err(unavailable())
    }

    async fn insert_if_absent(&self, _record: &DerivedRecord) -> Result<bool, DomainError> {
        Err(unavailable())
    }

    async fn apply_patch(
        &self,
        _id: Uuid,
        _patch: &FieldPatch,
    ) -> Result<PatchOutcome, DomainError> {
        Err(unavailable())
    }

    async fn remove(&self, _id: Uuid) -> Result<bool, DomainError> {
        Err(unavailable())
    }

    async fn watermark(&self) -> Result<Option<DateTime<Utc>>, DomainError> {
        Err(unavailable())
    }

    async fn upsert_all(&self, _records: &[DerivedRecord]) -> Result<usize, DomainError> {
        Err(unavailable())
    }

    async fn search(
        &self,
        _query: &SearchQuery,
        _now: DateTime<Utc>,
    ) -> Result<SearchPage, DomainError> {
        Err(unavailable())
    }
}
