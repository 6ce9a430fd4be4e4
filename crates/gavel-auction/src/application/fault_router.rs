//! Fault router.
//!
//! Consumes the fault envelopes the search service's consumers raise once
//! their retries run out. Every envelope starts in [`FaultState::Inspect`]
//! and ends in [`FaultState::Done`]. A fault on a single field that has a
//! safe default is corrected and the event republished once; any other fault,
//! or a second fault for an entity corrected within the escalation window, is
//! handed to operators through an [`AlertSink`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gavel_bus::consumer::MessageHandler;
use gavel_core::bus::{BusMessage, MessageBus};
use gavel_core::clock::SharedClock;
use gavel_core::error::{DeliveryError, HandlerError};
use gavel_core::event::{DomainEvent, MutableField};
use gavel_core::fault::{AlertLevel, AlertSink, FaultAlert, FaultEnvelope, FaultKind};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Replacement written into a field that failed validation downstream.
pub const UNKNOWN_TEXT: &str = "Unknown";

/// Where an envelope is in the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultState {
    /// Being classified.
    Inspect(FaultEnvelope),
    /// Finished; no further automated action.
    Done(FaultDisposition),
}

/// How an envelope was finally dealt with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultDisposition {
    /// A corrected event was republished.
    Republished(DomainEvent),
    /// A correction was already attempted for this entity; operators alerted.
    Escalated,
    /// Not correctable; recorded for manual triage.
    Triaged,
}

/// Result of inspecting an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// One field failed validation and has a safe default.
    Correctable(MutableField),
    /// Anything else.
    Uncorrectable,
}

/// Decides whether `envelope` can be fixed automatically.
///
/// Only an invalid-field fault qualifies, and only when the field has a safe
/// default and the wrapped event actually carries it.
#[must_use]
pub fn classify(envelope: &FaultEnvelope) -> Classification {
    match envelope.fault_kind {
        FaultKind::InvalidField { field }
            if has_safe_default(field) && carries_field(&envelope.message, field) =>
        {
            Classification::Correctable(field)
        }
        _ => Classification::Uncorrectable,
    }
}

fn has_safe_default(field: MutableField) -> bool {
    !matches!(field, MutableField::Year)
}

fn carries_field(event: &DomainEvent, field: MutableField) -> bool {
    match event {
        DomainEvent::Created(_) => true,
        DomainEvent::Updated(updated) => match field {
            MutableField::Make => updated.make.is_some(),
            MutableField::Model => updated.model.is_some(),
            MutableField::Color => updated.color.is_some(),
            MutableField::Mileage => updated.mileage.is_some(),
            MutableField::Year => updated.year.is_some(),
        },
        DomainEvent::Deleted(_) => false,
    }
}

/// Returns `event` with `field` replaced by its safe default, or `None` when
/// the field cannot be corrected in this event.
#[must_use]
pub fn correct(event: &DomainEvent, field: MutableField) -> Option<DomainEvent> {
    if !has_safe_default(field) || !carries_field(event, field) {
        return None;
    }
    let mut corrected = event.clone();
    match &mut corrected {
        DomainEvent::Created(created) => match field {
            MutableField::Make => created.make = UNKNOWN_TEXT.to_owned(),
            MutableField::Model => created.model = UNKNOWN_TEXT.to_owned(),
            MutableField::Color => created.color = UNKNOWN_TEXT.to_owned(),
            MutableField::Mileage => created.mileage = 0,
            MutableField::Year => return None,
        },
        DomainEvent::Updated(updated) => match field {
            MutableField::Make => updated.make = Some(UNKNOWN_TEXT.to_owned()),
            MutableField::Model => updated.model = Some(UNKNOWN_TEXT.to_owned()),
            MutableField::Color => updated.color = Some(UNKNOWN_TEXT.to_owned()),
            MutableField::Mileage => updated.mileage = Some(0),
            MutableField::Year => return None,
        },
        DomainEvent::Deleted(_) => return None,
    }
    Some(corrected)
}

/// Classifies fault envelopes and either republishes a corrected event or
/// alerts operators.
pub struct FaultRouter {
    bus: Arc<dyn MessageBus>,
    alerts: Arc<dyn AlertSink>,
    clock: SharedClock,
    escalation_window: Duration,
    corrected: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl FaultRouter {
    /// Creates a router republishing through `bus`. A second fault for an
    /// entity corrected less than `escalation_window` ago escalates.
    #[must_use]
    pub fn new(
        bus: Arc<dyn MessageBus>,
        alerts: Arc<dyn AlertSink>,
        clock: SharedClock,
        escalation_window: std::time::Duration,
    ) -> Self {
        Self {
            bus,
            alerts,
            clock,
            escalation_window: Duration::from_std(escalation_window)
                .unwrap_or(Duration::MAX),
            corrected: Mutex::new(HashMap::new()),
        }
    }

    /// Drives `envelope` from `Inspect` to `Done`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the corrected event could not be
    /// republished; the envelope is then safe to route again.
    #[instrument(
        skip(self, envelope),
        fields(
            entity_id = %envelope.entity_id(),
            exception_type = %envelope.exception_type
        )
    )]
    pub async fn route(&self, envelope: FaultEnvelope) -> Result<FaultDisposition, DeliveryError> {
        let mut state = FaultState::Inspect(envelope);
        loop {
            state = match state {
                FaultState::Inspect(envelope) => self.inspect(envelope).await?,
                FaultState::Done(disposition) => return Ok(disposition),
            };
        }
    }

    async fn inspect(&self, envelope: FaultEnvelope) -> Result<FaultState, DeliveryError> {
        let Classification::Correctable(field) = classify(&envelope) else {
            self.alert(AlertLevel::Triage, "fault is not automatically correctable", envelope)
                .await;
            return Ok(FaultState::Done(FaultDisposition::Triaged));
        };

        let entity_id = envelope.entity_id();
        let now = self.clock.now();
        if self.recently_corrected(entity_id, now) {
            self.alert(
                AlertLevel::Escalation,
                "entity faulted again after an automatic correction",
                envelope,
            )
            .await;
            return Ok(FaultState::Done(FaultDisposition::Escalated));
        }

        let Some(corrected) = correct(&envelope.message, field) else {
            self.alert(AlertLevel::Triage, "correction not applicable", envelope)
                .await;
            return Ok(FaultState::Done(FaultDisposition::Triaged));
        };

        self.bus.publish(&BusMessage::Event(corrected.clone())).await?;
        self.remember_correction(entity_id, now);
        info!(%field, "corrected event republished");
        Ok(FaultState::Done(FaultDisposition::Republished(corrected)))
    }

    fn recently_corrected(&self, entity_id: Uuid, now: DateTime<Utc>) -> bool {
        let mut corrected = self
            .corrected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        corrected.retain(|_, at| now.signed_duration_since(*at) < self.escalation_window);
        corrected.contains_key(&entity_id)
    }

    fn remember_correction(&self, entity_id: Uuid, now: DateTime<Utc>) {
        self.corrected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(entity_id, now);
    }

    async fn alert(&self, level: AlertLevel, reason: &str, envelope: FaultEnvelope) {
        self.alerts
            .record(FaultAlert {
                level,
                entity_id: envelope.entity_id(),
                reason: reason.to_owned(),
                envelope,
            })
            .await;
    }
}

#[async_trait]
impl MessageHandler for FaultRouter {
    fn name(&self) -> &'static str {
        "fault-router"
    }

    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        match message {
            BusMessage::Fault(envelope) => self
                .route(envelope.clone())
                .await
                .map(|_| ())
                .map_err(|e| HandlerError::new(FaultKind::Unknown, e.to_string())),
            BusMessage::Event(event) => Err(HandlerError::new(
                FaultKind::Unhandled,
                format!("fault router received a plain {} event", event.kind()),
            )),
        }
    }
}

/// Alert sink that writes alerts to the log. Escalations log at error level,
/// triage at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn record(&self, alert: FaultAlert) {
        let envelope = &alert.envelope;
        match alert.level {
            AlertLevel::Escalation => error!(
                entity_id = %alert.entity_id,
                event_kind = %envelope.message.kind(),
                exception_type = %envelope.exception_type,
                exception_message = %envelope.exception_message,
                attempts = envelope.attempts,
                reason = %alert.reason,
                "fault escalated to operators"
            ),
            AlertLevel::Triage => warn!(
                entity_id = %alert.entity_id,
                event_kind = %envelope.message.kind(),
                exception_type = %envelope.exception_type,
                exception_message = %envelope.exception_message,
                attempts = envelope.attempts,
                reason = %alert.reason,
                "fault recorded for triage"
            ),
        }
    }
}
