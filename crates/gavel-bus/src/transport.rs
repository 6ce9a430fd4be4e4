//! Receiving side of the bus.

use async_trait::async_trait;
use gavel_core::bus::BusMessage;
use gavel_core::error::DeliveryError;
use uuid::Uuid;

use crate::topology::QueueName;

/// A message handed to a consumer. Until it is acked or released it is
/// invisible to other consumers of the same queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned identifier of this queued copy.
    pub delivery_id: Uuid,
    /// Queue the message was received from.
    pub queue: QueueName,
    /// The message.
    pub message: BusMessage,
    /// How many times this copy has been handed out, including this one.
    pub delivery_count: u32,
}

impl Delivery {
    /// Whether the broker handed this copy out before.
    #[must_use]
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// Broker operations a consumer needs.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Takes up to `max` visible messages from `queue`, oldest first.
    async fn receive(&self, queue: &QueueName, max: usize) -> Result<Vec<Delivery>, DeliveryError>;

    /// Removes a handled message for good. Acking twice is not an error.
    async fn ack(&self, delivery: &Delivery) -> Result<(), DeliveryError>;

    /// Returns an unhandled message to its queue for redelivery.
    async fn release(&self, delivery: &Delivery) -> Result<(), DeliveryError>;

    /// Restarts the lease on a message still being worked on, so it is not
    /// handed to another consumer while retries are pending.
    async fn renew(&self, delivery: &Delivery) -> Result<(), DeliveryError>;
}
