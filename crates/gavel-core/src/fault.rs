//! Fault envelopes and the operator alert port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HandlerError;
use crate::event::{DomainEvent, MutableField};

/// Classification of a terminal handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FaultKind {
    /// A single field of the event was rejected.
    InvalidField {
        /// The rejected field.
        field: MutableField,
    },
    /// The consumer's store failed.
    Persistence,
    /// The consumer had no handler for the message.
    Unhandled,
    /// Anything the consumer could not classify.
    Unknown,
}

impl FaultKind {
    /// Returns the exception type name recorded in fault envelopes.
    #[must_use]
    pub fn exception_type(self) -> &'static str {
        match self {
            Self::InvalidField { .. } => "InvalidField",
            Self::Persistence => "PersistenceError",
            Self::Unhandled => "UnhandledMessage",
            Self::Unknown => "UnknownError",
        }
    }
}

/// An event whose delivery exhausted its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultEnvelope {
    /// The event exactly as it was delivered.
    pub message: DomainEvent,
    /// Classification of the last failure.
    pub fault_kind: FaultKind,
    /// Exception type name of the last failure.
    pub exception_type: String,
    /// Human-readable cause of the last failure.
    pub exception_message: String,
    /// How many times the handler was invoked.
    pub attempts: u32,
    /// When the retry budget ran out.
    pub faulted_at: DateTime<Utc>,
}

impl FaultEnvelope {
    /// Wraps `message` with the failure that exhausted its retries.
    #[must_use]
    pub fn new(
        message: DomainEvent,
        error: &HandlerError,
        attempts: u32,
        faulted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message,
            fault_kind: error.kind,
            exception_type: error.kind.exception_type().to_owned(),
            exception_message: error.message.clone(),
            attempts,
            faulted_at,
        }
    }

    /// Returns the id of the entity the faulted event describes.
    #[must_use]
    pub fn entity_id(&self) -> Uuid {
        self.message.entity_id()
    }
}

/// Severity of an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Recorded for manual triage.
    Triage,
    /// An automated correction did not stick; a human must look.
    Escalation,
}

/// A fault handed to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultAlert {
    /// How urgent the alert is.
    pub level: AlertLevel,
    /// Entity the fault concerns.
    pub entity_id: Uuid,
    /// Why no further automated action is taken.
    pub reason: String,
    /// The fault that triggered the alert.
    pub envelope: FaultEnvelope,
}

/// Destination for faults that need a human.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Records an alert. Must not fail; sinks log their own errors.
    async fn record(&self, alert: FaultAlert);
}
