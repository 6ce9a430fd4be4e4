//! Error taxonomy shared by both services.

use thiserror::Error;
use uuid::Uuid;

use crate::event::{EventKind, MutableField};
use crate::fault::FaultKind;

/// Errors raised by the stores on either side of the pipeline.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested auction does not exist.
    #[error("auction not found: {0}")]
    NotFound(Uuid),

    /// Request input failed validation before any write was attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The mutation and its outbox entry were rolled back together.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

/// Errors raised while handing a message to the bus.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The broker could not be reached or refused the write.
    #[error("message bus unavailable: {0}")]
    Unavailable(String),

    /// The message could not be encoded or decoded.
    #[error("message encoding failed: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Errors raised while applying an event to the derived store.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A field carried by the event fails the derived store's rules.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The offending field.
        field: MutableField,
        /// Why the value was rejected.
        reason: String,
    },

    /// No handler is registered for this kind of event.
    #[error("no handler registered for {0} events")]
    Unhandled(EventKind),

    /// The derived store failed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] DomainError),
}

/// A handler failure as the bus sees it: a fault classification plus the
/// human-readable cause.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .kind.exception_type(), .message)]
pub struct HandlerError {
    /// Classification carried into the fault envelope.
    pub kind: FaultKind,
    /// Human-readable cause.
    pub message: String,
}

impl HandlerError {
    /// Creates a handler error of the given kind.
    #[must_use]
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ApplyError> for HandlerError {
    fn from(err: ApplyError) -> Self {
        let kind = match &err {
            ApplyError::InvalidField { field, .. } => FaultKind::InvalidField { field: *field },
            ApplyError::Unhandled(_) => FaultKind::Unhandled,
            ApplyError::Persistence(_) => FaultKind::Persistence,
        };
        Self::new(kind, err.to_string())
    }
}

/// Errors raised by the startup reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The authoritative service could not be reached or answered badly.
    #[error("authoritative service unavailable: {0}")]
    Unavailable(String),

    /// The derived store failed while reading the watermark or loading.
    #[error("derived store failure: {0}")]
    Store(#[from] DomainError),

    /// Shutdown was requested before reconciliation could finish.
    #[error("reconciliation cancelled")]
    Cancelled,
}
