//! Test source: a scripted `AuthoritativeSource` for reconciliation tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::derived::AuthoritativeSource;
use gavel_core::error::ReconcileError;
use gavel_core::snapshot::RecordSnapshot;

/// An authoritative source serving a fixed set of snapshots, optionally
/// failing its first few calls as if the service were still starting.
#[derive(Debug)]
pub struct ScriptedSource {
    records: Vec<RecordSnapshot>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    requested: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl ScriptedSource {
    /// Create a source serving `records`.
    #[must_use]
    pub fn new(records: Vec<RecordSnapshot>) -> Self {
        Self {
            records,
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Makes the first `failures` calls fail with `Unavailable`.
    #[must_use]
    pub fn failing_first(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The `since` argument of every call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requested_since(&self) -> Vec<Option<DateTime<Utc>>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthoritativeSource for ScriptedSource {
    async fn records_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RecordSnapshot>, ReconcileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(since);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ReconcileError::Unavailable("connection refused".into()));
        }

        Ok(self
            .records
            .iter()
            .filter(|r| since.is_none_or(|s| r.updated_at > s))
            .cloned()
            .collect())
    }
}
