//! Startup reconciliation.
//!
//! Backfills the projection from the auction service: read the watermark
//! (latest `updated_at` held), pull every auction changed after it and upsert
//! them with full overwrite. While the auction service is unreachable the
//! pull is retried forever at a fixed backoff; only shutdown stops it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gavel_core::derived::{AuthoritativeSource, DerivedRecord, DerivedStore};
use gavel_core::error::ReconcileError;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::domain::mapping;

/// Summary of a finished reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Watermark the pull was filtered by; `None` means a full pull.
    pub watermark: Option<DateTime<Utc>>,
    /// Records upserted.
    pub loaded: usize,
    /// Pull attempts made, including the successful one.
    pub attempts: u32,
}

/// Result of asking the reconciler to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This call performed the reconciliation.
    Completed(ReconcileReport),
    /// Another call already started it; nothing was done.
    AlreadyStarted,
}

/// One-shot backfill of the projection.
pub struct Reconciler {
    store: Arc<dyn DerivedStore>,
    source: Arc<dyn AuthoritativeSource>,
    backoff: Duration,
    started: AtomicBool,
}

impl Reconciler {
    /// Creates a reconciler that waits `backoff` between failed attempts.
    #[must_use]
    pub fn new(
        store: Arc<dyn DerivedStore>,
        source: Arc<dyn AuthoritativeSource>,
        backoff: Duration,
    ) -> Self {
        Self {
            store,
            source,
            backoff,
            started: AtomicBool::new(false),
        }
    }

    /// Runs the reconciliation. Only the first call on a reconciler does any
    /// work; later or concurrent calls return `AlreadyStarted`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Cancelled` if `shutdown` fires first.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(ReconcileOutcome::AlreadyStarted);
        }

        let mut attempts = 0;
        loop {
            if shutdown.is_cancelled() {
                return Err(ReconcileError::Cancelled);
            }
            attempts += 1;

            match self.attempt().await {
                Ok((watermark, loaded)) => {
                    info!(?watermark, loaded, attempts, "reconciliation complete");
                    return Ok(ReconcileOutcome::Completed(ReconcileReport {
                        watermark,
                        loaded,
                        attempts,
                    }));
                }
                Err(e) => {
                    warn!(attempts, backoff = ?self.backoff, error = %e, "reconciliation failed; retrying");
                    tokio::select! {
                        () = shutdown.cancelled() => return Err(ReconcileError::Cancelled),
                        () = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&self) -> Result<(Option<DateTime<Utc>>, usize), ReconcileError> {
        let watermark = self.store.watermark().await?;
        let snapshots = self.source.records_updated_since(watermark).await?;
        let records: Vec<DerivedRecord> = snapshots
            .into_iter()
            .map(mapping::record_from_snapshot)
            .collect();
        let loaded = if records.is_empty() {
            0
        } else {
            self.store.upsert_all(&records).await?
        };
        Ok((watermark, loaded))
    }
}
