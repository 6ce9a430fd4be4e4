//! Consumer dispatcher.
//!
//! Applies auction events to the search projection through a table of
//! per-kind handler functions registered at construction. Every handler is
//! idempotent: applying the same event twice leaves the projection as
//! applying it once did.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use gavel_bus::consumer::MessageHandler;
use gavel_core::bus::BusMessage;
use gavel_core::derived::{DerivedStore, PatchOutcome};
use gavel_core::error::{ApplyError, HandlerError};
use gavel_core::event::{DomainEvent, EventKind};
use gavel_core::fault::FaultKind;
use tracing::{debug, instrument, warn};

use crate::domain::{mapping, validation};

/// What applying one event did to the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new record was inserted.
    Inserted,
    /// The record already existed; nothing changed.
    Duplicate,
    /// Fields were merged into an existing record.
    Updated,
    /// The record was removed.
    Deleted,
    /// The record the event refers to does not exist; nothing changed.
    Missing,
    /// The record already holds a later change; nothing changed.
    Stale,
}

type ApplyFuture<'a> = Pin<Box<dyn Future<Output = Result<ApplyOutcome, ApplyError>> + Send + 'a>>;

/// Handler registered for one event kind.
pub type ApplyFn = for<'a> fn(&'a dyn DerivedStore, &'a DomainEvent) -> ApplyFuture<'a>;

/// Routes events to their handler by kind.
pub struct Dispatcher {
    store: Arc<dyn DerivedStore>,
    handlers: HashMap<EventKind, ApplyFn>,
}

impl Dispatcher {
    /// Creates a dispatcher with a handler for every event kind.
    #[must_use]
    pub fn new(store: Arc<dyn DerivedStore>) -> Self {
        Self::with_handlers(
            store,
            [
                (EventKind::Created, apply_created as ApplyFn),
                (EventKind::Updated, apply_updated as ApplyFn),
                (EventKind::Deleted, apply_deleted as ApplyFn),
            ],
        )
    }

    /// Creates a dispatcher with exactly the given handlers.
    #[must_use]
    pub fn with_handlers(
        store: Arc<dyn DerivedStore>,
        handlers: impl IntoIterator<Item = (EventKind, ApplyFn)>,
    ) -> Self {
        Self {
            store,
            handlers: handlers.into_iter().collect(),
        }
    }

    /// Applies `event` to the projection.
    ///
    /// # Errors
    ///
    /// Returns `ApplyError::Unhandled` if no handler is registered for the
    /// event's kind, `ApplyError::InvalidField` if a field fails validation,
    /// or `ApplyError::Persistence` if the store fails.
    #[instrument(skip(self, event), fields(entity_id = %event.entity_id(), kind = %event.kind()))]
    pub async fn apply(&self, event: &DomainEvent) -> Result<ApplyOutcome, ApplyError> {
        let kind = event.kind();
        let handler = self.handlers.get(&kind).ok_or(ApplyError::Unhandled(kind))?;
        let outcome = handler(self.store.as_ref(), event).await?;
        debug!(?outcome, "event applied");
        Ok(outcome)
    }
}

fn apply_created<'a>(store: &'a dyn DerivedStore, event: &'a DomainEvent) -> ApplyFuture<'a> {
    Box::pin(async move {
        let DomainEvent::Created(created) = event else {
            return Err(ApplyError::Unhandled(event.kind()));
        };
        validation::check_created(created)?;

        let record = mapping::record_from_created(created);
        if store.insert_if_absent(&record).await? {
            return Ok(ApplyOutcome::Inserted);
        }
        if let Some(existing) = store.find(record.id).await? {
            if existing != record {
                warn!(
                    entity_id = %record.id,
                    "created event differs from existing record; existing record kept"
                );
            }
        }
        Ok(ApplyOutcome::Duplicate)
    })
}

fn apply_updated<'a>(store: &'a dyn DerivedStore, event: &'a DomainEvent) -> ApplyFuture<'a> {
    Box::pin(async move {
        let DomainEvent::Updated(updated) = event else {
            return Err(ApplyError::Unhandled(event.kind()));
        };
        validation::check_updated(updated)?;

        let patch = mapping::patch_from_updated(updated);
        match store.apply_patch(updated.id, &patch).await? {
            PatchOutcome::Applied => Ok(ApplyOutcome::Updated),
            PatchOutcome::Stale => {
                debug!(entity_id = %updated.id, "update older than stored record ignored");
                Ok(ApplyOutcome::Stale)
            }
            PatchOutcome::Missing => {
                debug!(entity_id = %updated.id, "update for unknown record ignored");
                Ok(ApplyOutcome::Missing)
            }
        }
    })
}

fn apply_deleted<'a>(store: &'a dyn DerivedStore, event: &'a DomainEvent) -> ApplyFuture<'a> {
    Box::pin(async move {
        let DomainEvent::Deleted(deleted) = event else {
            return Err(ApplyError::Unhandled(event.kind()));
        };
        if store.remove(deleted.id).await? {
            Ok(ApplyOutcome::Deleted)
        } else {
            Ok(ApplyOutcome::Missing)
        }
    })
}

#[async_trait]
impl MessageHandler for Dispatcher {
    fn name(&self) -> &'static str {
        "search-dispatcher"
    }

    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        match message {
            BusMessage::Event(event) => self.apply(event).await.map(|_| ()).map_err(Into::into),
            BusMessage::Fault(envelope) => Err(HandlerError::new(
                FaultKind::Unhandled,
                format!(
                    "dispatcher received a fault envelope for {}",
                    envelope.entity_id()
                ),
            )),
        }
    }
}
