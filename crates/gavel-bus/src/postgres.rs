//! `PostgreSQL`-backed durable queues.
//!
//! Each queue is a set of rows in `bus_messages` sharing a `queue` name.
//! Publishing fans a message out to one row per bound queue inside a single
//! transaction. Receiving leases rows with `FOR UPDATE SKIP LOCKED` and pushes
//! their `visible_at` past the lease, so a consumer that dies mid-message
//! gets its deliveries redelivered once the lease lapses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gavel_core::bus::{BusMessage, MessageBus};
use gavel_core::error::DeliveryError;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::topology::{QueueName, Topology};
use crate::transport::{Delivery, QueueTransport};

/// Suffix of the queue undecodable rows are moved to.
pub const UNROUTABLE_SUFFIX: &str = "-unroutable";

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    seq: i64,
    queue: String,
    payload: serde_json::Value,
    delivery_count: i32,
}

/// Bus whose queues are rows in a `PostgreSQL` table.
#[derive(Debug, Clone)]
pub struct PgBus {
    pool: PgPool,
    topology: Arc<Topology>,
    lease: Duration,
}

impl PgBus {
    /// Creates a bus over `pool`. Received messages stay invisible to other
    /// consumers for `lease` unless acked or released earlier.
    #[must_use]
    pub fn new(pool: PgPool, topology: Topology, lease: Duration) -> Self {
        Self {
            pool,
            topology: Arc::new(topology),
            lease,
        }
    }

    async fn park(&self, id: Uuid, queue: &str) -> Result<(), DeliveryError> {
        sqlx::query("UPDATE bus_messages SET queue = $2 WHERE id = $1")
            .bind(id)
            .bind(format!("{queue}{UNROUTABLE_SUFFIX}"))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> DeliveryError {
    DeliveryError::Unavailable(err.to_string())
}

#[async_trait]
impl MessageBus for PgBus {
    async fn publish(&self, message: &BusMessage) -> Result<(), DeliveryError> {
        let key = message.routing_key();
        let targets = self.topology.queues_for(key);
        if targets.is_empty() {
            debug!(routing_key = %key, "no queue bound; message not routed");
            return Ok(());
        }

        let payload = serde_json::to_value(message)?;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        for queue in targets {
            sqlx::query(
                "INSERT INTO bus_messages (id, queue, routing_key, payload) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::now_v7())
            .bind(queue.as_str())
            .bind(key.to_string())
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }
        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for PgBus {
    async fn receive(&self, queue: &QueueName, max: usize) -> Result<Vec<Delivery>, DeliveryError> {
        let limit = i64::try_from(max).unwrap_or(i64::MAX);
        let lease_secs = self.lease.as_secs_f64();

        let mut rows: Vec<MessageRow> = sqlx::query_as(
            r"
            WITH next AS (
                SELECT id FROM bus_messages
                WHERE queue = $1 AND visible_at <= now()
                ORDER BY seq
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE bus_messages m
            SET visible_at = now() + make_interval(secs => $3),
                delivery_count = m.delivery_count + 1
            FROM next
            WHERE m.id = next.id
            RETURNING m.id, m.seq, m.queue, m.payload, m.delivery_count
            ",
        )
        .bind(queue.as_str())
        .bind(limit)
        .bind(lease_secs)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        // UPDATE .. RETURNING does not preserve the CTE's order.
        rows.sort_by_key(|row| row.seq);

        let mut deliveries = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<BusMessage>(row.payload) {
                Ok(message) => deliveries.push(Delivery {
                    delivery_id: row.id,
                    queue: QueueName::from_raw(row.queue),
                    message,
                    delivery_count: u32::try_from(row.delivery_count).unwrap_or(u32::MAX),
                }),
                Err(e) => {
                    warn!(
                        delivery_id = %row.id,
                        queue = %row.queue,
                        error = %e,
                        "undecodable message parked"
                    );
                    self.park(row.id, &row.queue).await?;
                }
            }
        }
        Ok(deliveries)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        sqlx::query("DELETE FROM bus_messages WHERE id = $1")
            .bind(delivery.delivery_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn release(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        sqlx::query("UPDATE bus_messages SET visible_at = now() WHERE id = $1")
            .bind(delivery.delivery_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn renew(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        sqlx::query(
            "UPDATE bus_messages SET visible_at = now() + make_interval(secs => $2) WHERE id = $1",
        )
        .bind(delivery.delivery_id)
        .bind(self.lease.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}
