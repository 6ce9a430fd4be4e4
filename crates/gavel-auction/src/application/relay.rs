//! Outbox relay.
//!
//! Polls the outbox on a fixed interval and moves pending entries onto the
//! bus in sequence order. An entry is marked sent only after the bus accepts
//! it; the first failure ends the cycle so later entries never overtake an
//! earlier one. A crash between publish and mark re-publishes that entry on
//! the next cycle, which consumers tolerate.

use std::sync::Arc;
use std::time::Duration;

use gavel_core::bus::{BusMessage, MessageBus};
use gavel_core::clock::SharedClock;
use gavel_core::config::PipelineConfig;
use gavel_core::error::{DeliveryError, DomainError};
use gavel_core::outbox::OutboxStore;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Why a relay cycle stopped early.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The outbox could not be read or updated.
    #[error("outbox unavailable: {0}")]
    Store(#[from] DomainError),

    /// The bus refused an entry; it and every later entry stay pending.
    #[error("publishing outbox entry {sequence} failed after {published} were relayed: {source}")]
    Delivery {
        /// Sequence of the entry that was refused.
        sequence: i64,
        /// Entries relayed earlier in the same cycle.
        published: usize,
        /// The bus error.
        source: DeliveryError,
    },
}

/// Background task that drains the outbox onto the bus.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    bus: Arc<dyn MessageBus>,
    clock: SharedClock,
    poll_interval: Duration,
    batch_size: i64,
}

impl OutboxRelay {
    /// Creates a relay using the poll interval and batch size from `config`.
    #[must_use]
    pub fn new(
        store: Arc<dyn OutboxStore>,
        bus: Arc<dyn MessageBus>,
        clock: SharedClock,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            poll_interval: config.poll_interval,
            batch_size: config.outbox_batch_size,
        }
    }

    /// Relays one batch of pending entries and returns how many were
    /// published.
    ///
    /// # Errors
    ///
    /// Returns `RelayError` at the first entry that could not be published
    /// or marked; that entry and all later ones remain pending.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<usize, RelayError> {
        let entries = self.store.pending_entries(self.batch_size).await?;
        let mut published = 0;

        for entry in entries {
            let message = BusMessage::Event(entry.event);
            self.bus
                .publish(&message)
                .await
                .map_err(|source| RelayError::Delivery {
                    sequence: entry.sequence,
                    published,
                    source,
                })?;
            self.store.mark_sent(entry.sequence, self.clock.now()).await?;
            published += 1;
            debug!(
                sequence = entry.sequence,
                routing_key = %message.routing_key(),
                "outbox entry relayed"
            );
        }

        Ok(published)
    }

    /// Runs cycles every poll interval until `shutdown` fires. A cycle that
    /// fills a whole batch is followed immediately by another. An in-progress
    /// cycle is always finished.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            "outbox relay started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            loop {
                match self.run_cycle().await {
                    Ok(published) => {
                        if published > 0 {
                            info!(published, "outbox entries relayed");
                        }
                        let full_batch =
                            i64::try_from(published).is_ok_and(|n| n >= self.batch_size);
                        if !full_batch || shutdown.is_cancelled() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "outbox relay cycle stopped; retrying next tick");
                        break;
                    }
                }
            }
        }
        info!("outbox relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use gavel_core::auction::AuctionRecord;
    use gavel_core::bus::BusMessage;
    use gavel_core::config::PipelineConfig;
    use gavel_core::event::{AuctionDeleted, DomainEvent};
    use gavel_core::outbox::{OutboxStore, StateChange};
    use gavel_test_support::{FixedClock, InMemoryAuctionStore, RecordingBus};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use super::{OutboxRelay, RelayError};

    fn deleted(id: Uuid) -> DomainEvent {
        DomainEvent::Deleted(AuctionDeleted { id })
    }

    async fn store_with_pending(count: usize) -> (Arc<InMemoryAuctionStore>, Vec<Uuid>) {
        let records: Vec<AuctionRecord> = (0..count)
            .map(|i| AuctionRecord {
                id: Uuid::new_v4(),
                make: format!("Make{i}"),
                model: "Model".into(),
                color: "Grey".into(),
                mileage: 0,
                year: 2020,
                seller: "alice".into(),
                winner: None,
                auction_end: Utc::now(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect();
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let store = Arc::new(InMemoryAuctionStore::with_auctions(records));
        for id in &ids {
            store
                .record_mutation(StateChange::Delete(*id), deleted(*id), Utc::now())
                .await
                .unwrap();
        }
        (store, ids)
    }

    fn relay(store: Arc<InMemoryAuctionStore>, bus: Arc<RecordingBus>, batch: i64) -> OutboxRelay {
        let config = PipelineConfig {
            outbox_batch_size: batch,
            poll_interval: std::time::Duration::from_millis(10),
            ..PipelineConfig::default()
        };
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        OutboxRelay::new(store, bus, Arc::new(FixedClock(at)), &config)
    }

    #[tokio::test]
    async fn test_run_cycle_publishes_in_sequence_and_marks_sent() {
        // Arrange
        let (store, ids) = store_with_pending(3).await;
        let bus = Arc::new(RecordingBus::new());
        let relay = relay(store.clone(), bus.clone(), 100);

        // Act
        let published = relay.run_cycle().await.unwrap();

        // Assert
        assert_eq!(published, 3);
        let expected: Vec<BusMessage> = ids.iter().map(|id| BusMessage::Event(deleted(*id))).collect();
        assert_eq!(bus.published(), expected);
        assert!(store.outbox().iter().all(|e| !e.pending && e.sent_at.is_some()));
    }

    #[tokio::test]
    async fn test_run_cycle_stops_at_first_failure_and_keeps_rest_pending() {
        // Arrange
        let (store, ids) = store_with_pending(3).await;
        let bus = Arc::new(RecordingBus::fail_after(1));
        let relay = relay(store.clone(), bus.clone(), 100);

        // Act
        let result = relay.run_cycle().await;

        // Assert
        match result {
            Err(RelayError::Delivery {
                sequence,
                published,
                ..
            }) => {
                assert_eq!(published, 1);
                assert_eq!(sequence, store.outbox()[1].sequence);
            }
            other => panic!("expected Delivery error, got {other:?}"),
        }
        assert_eq!(bus.published(), vec![BusMessage::Event(deleted(ids[0]))]);
        let pending: Vec<bool> = store.outbox().iter().map(|e| e.pending).collect();
        assert_eq!(pending, [false, true, true]);
    }

    #[tokio::test]
    async fn test_run_cycle_respects_batch_size() {
        let (store, _) = store_with_pending(5).await;
        let bus = Arc::new(RecordingBus::new());
        let relay = relay(store.clone(), bus.clone(), 2);

        let published = relay.run_cycle().await.unwrap();

        assert_eq!(published, 2);
        assert_eq!(store.outbox().iter().filter(|e| e.pending).count(), 3);
    }

    #[tokio::test]
    async fn test_run_cycle_surfaces_store_outage() {
        let (store, _) = store_with_pending(1).await;
        store.set_unavailable(true);
        let bus = Arc::new(RecordingBus::new());
        let relay = relay(store, bus.clone(), 100);

        let result = relay.run_cycle().await;

        assert!(matches!(result, Err(RelayError::Store(_))));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_full_batches_then_stops_on_shutdown() {
        // Arrange
        let (store, _) = store_with_pending(5).await;
        let bus = Arc::new(RecordingBus::new());
        let relay = relay(store.clone(), bus.clone(), 2);
        let token = CancellationToken::new();

        // Act
        let running = tokio::spawn(relay.run(token.clone()));
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while bus.published().len() < 5 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        token.cancel();
        running.await.unwrap();

        // Assert
        assert!(store.outbox().iter().all(|e| !e.pending));
    }
}
