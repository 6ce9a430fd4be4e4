//! Message bus abstraction.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::event::{DomainEvent, EventKind};
use crate::fault::FaultEnvelope;

/// Everything that travels over the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum BusMessage {
    /// A domain event published by the auction service.
    Event(DomainEvent),
    /// An event that exhausted its consumer's retry budget.
    Fault(FaultEnvelope),
}

impl BusMessage {
    /// Returns the key the bus routes this message by.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        match self {
            Self::Event(event) => RoutingKey::event(event.kind()),
            Self::Fault(envelope) => RoutingKey::fault(envelope.message.kind()),
        }
    }
}

/// Routing key: an event kind, optionally on the fault channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    /// The event kind carried.
    pub kind: EventKind,
    /// Whether this is the fault channel for that kind.
    pub fault: bool,
}

impl RoutingKey {
    /// Routing key of regular events of `kind`.
    #[must_use]
    pub fn event(kind: EventKind) -> Self {
        Self { kind, fault: false }
    }

    /// Routing key of fault envelopes wrapping events of `kind`.
    #[must_use]
    pub fn fault(kind: EventKind) -> Self {
        Self { kind, fault: true }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fault {
            write!(f, "{}-fault", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// Publishing side of the message bus.
///
/// A successful return means the broker has durably accepted the message for
/// every queue bound to its routing key.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a single message.
    async fn publish(&self, message: &BusMessage) -> Result<(), DeliveryError>;
}
