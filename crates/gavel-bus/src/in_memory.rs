//! Single-process bus.
//!
//! Queues live in memory, so this transport is only durable for the life of
//! the process. It backs tests and single-binary deployments; the
//! `PostgreSQL` transport is the durable one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use gavel_core::bus::{BusMessage, MessageBus};
use gavel_core::error::DeliveryError;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::topology::{QueueName, Topology};
use crate::transport::{Delivery, QueueTransport};

#[derive(Debug, Clone)]
struct Queued {
    id: Uuid,
    message: BusMessage,
    delivery_count: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Queued>,
    in_flight: HashMap<Uuid, Queued>,
}

/// In-memory bus implementing both the publishing and receiving ports.
///
/// Clones share the same queues.
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    topology: Arc<Topology>,
    queues: Arc<Mutex<HashMap<QueueName, QueueState>>>,
}

impl InMemoryBus {
    /// Creates a bus routing by `topology`.
    #[must_use]
    pub fn new(topology: Topology) -> Self {
        Self {
            topology: Arc::new(topology),
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of messages in `queue`, visible or in flight.
    pub async fn depth(&self, queue: &QueueName) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |q| q.ready.len() + q.in_flight.len())
    }

    /// Snapshot of the visible messages in `queue`, oldest first.
    pub async fn peek(&self, queue: &QueueName) -> Vec<BusMessage> {
        self.queues.lock().await.get(queue).map_or_else(Vec::new, |q| {
            q.ready.iter().map(|m| m.message.clone()).collect()
        })
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, message: &BusMessage) -> Result<(), DeliveryError> {
        let key = message.routing_key();
        let targets = self.topology.queues_for(key);
        if targets.is_empty() {
            debug!(routing_key = %key, "no queue bound; message not routed");
            return Ok(());
        }

        let mut queues = self.queues.lock().await;
        for queue in targets {
            queues.entry(queue.clone()).or_default().ready.push_back(Queued {
                id: Uuid::now_v7(),
                message: message.clone(),
                delivery_count: 0,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for InMemoryBus {
    async fn receive(&self, queue: &QueueName, max: usize) -> Result<Vec<Delivery>, DeliveryError> {
        let mut queues = self.queues.lock().await;
        let Some(state) = queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        let mut deliveries = Vec::new();
        while deliveries.len() < max {
            let Some(mut queued) = state.ready.pop_front() else {
                break;
            };
            queued.delivery_count += 1;
            deliveries.push(Delivery {
                delivery_id: queued.id,
                queue: queue.clone(),
                message: queued.message.clone(),
                delivery_count: queued.delivery_count,
            });
            state.in_flight.insert(queued.id, queued);
        }
        Ok(deliveries)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        let mut queues = self.queues.lock().await;
        if let Some(state) = queues.get_mut(&delivery.queue) {
            state.in_flight.remove(&delivery.delivery_id);
        }
        Ok(())
    }

    async fn release(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        let mut queues = self.queues.lock().await;
        if let Some(state) = queues.get_mut(&delivery.queue) {
            if let Some(queued) = state.in_flight.remove(&delivery.delivery_id) {
                state.ready.push_front(queued);
            }
        }
        Ok(())
    }

    /// In-flight messages stay leased until acked or released.
    async fn renew(&self, _delivery: &Delivery) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gavel_core::event::{AuctionDeleted, DomainEvent, EventKind};
    use uuid::Uuid;

    use super::*;
    use crate::topology::{AUCTION_SERVICE, SEARCH_SERVICE};

    fn deleted(id: Uuid) -> BusMessage {
        BusMessage::Event(DomainEvent::Deleted(AuctionDeleted { id }))
    }

    fn deleted_queue() -> QueueName {
        QueueName::for_events(AUCTION_SERVICE, SEARCH_SERVICE, EventKind::Deleted)
    }

    #[tokio::test]
    async fn test_publish_routes_to_bound_queue_in_fifo_order() {
        // Arrange
        let bus = InMemoryBus::new(Topology::auction_search());
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

        // Act
        bus.publish(&deleted(first)).await.unwrap();
        bus.publish(&deleted(second)).await.unwrap();
        let deliveries = bus.receive(&deleted_queue(), 10).await.unwrap();

        // Assert
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].message, deleted(first));
        assert_eq!(deliveries[1].message, deleted(second));
        assert!(!deliveries[0].is_redelivery());
    }

    #[tokio::test]
    async fn test_received_message_is_invisible_until_released() {
        let bus = InMemoryBus::new(Topology::auction_search());
        bus.publish(&deleted(Uuid::new_v4())).await.unwrap();

        let first = bus.receive(&deleted_queue(), 1).await.unwrap();
        let while_in_flight = bus.receive(&deleted_queue(), 1).await.unwrap();
        bus.release(&first[0]).await.unwrap();
        let again = bus.receive(&deleted_queue(), 1).await.unwrap();

        assert!(while_in_flight.is_empty());
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].delivery_id, first[0].delivery_id);
        assert!(again[0].is_redelivery());
    }

    #[tokio::test]
    async fn test_ack_removes_message_and_is_idempotent() {
        let bus = InMemoryBus::new(Topology::auction_search());
        bus.publish(&deleted(Uuid::new_v4())).await.unwrap();
        let delivery = bus.receive(&deleted_queue(), 1).await.unwrap().remove(0);

        bus.ack(&delivery).await.unwrap();
        bus.ack(&delivery).await.unwrap();

        assert_eq!(bus.depth(&deleted_queue()).await, 0);
    }

    #[tokio::test]
    async fn test_unbound_routing_key_is_accepted_but_not_queued() {
        let bus = InMemoryBus::new(Topology::new());

        bus.publish(&deleted(Uuid::new_v4())).await.unwrap();

        assert_eq!(bus.depth(&deleted_queue()).await, 0);
    }
}
