//! Retrying queue consumer.
//!
//! A [`QueueConsumer`] pulls deliveries from one queue and runs each through
//! a [`MessageHandler`] on its own task, with at most `concurrency` tasks in
//! flight. A failing handler is retried in place per the [`RetryPolicy`],
//! renewing the delivery's lease before each pause. Once the budget is spent
//! the consumer publishes exactly one [`FaultEnvelope`] for the event and
//! acks the original.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gavel_core::bus::{BusMessage, MessageBus};
use gavel_core::clock::{SharedClock, SystemClock};
use gavel_core::config::PipelineConfig;
use gavel_core::error::{DeliveryError, HandlerError};
use gavel_core::fault::FaultEnvelope;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::topology::QueueName;
use crate::transport::{Delivery, QueueTransport};

const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(250);

/// Application code invoked for every delivered message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handles one message. Must be idempotent: the same message can arrive
    /// more than once.
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError>;
}

/// How often a failing message is retried before it faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Redeliveries after the first failed attempt.
    pub retry_count: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Takes the retry settings from the pipeline configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
        }
    }

    /// Total handler invocations allowed for one delivery.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

/// What became of a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The handler succeeded and the message was acked.
    Handled {
        /// Invocations it took.
        attempts: u32,
    },
    /// Retries ran out; a fault envelope was published and the original acked.
    Faulted {
        /// Invocations made.
        attempts: u32,
    },
    /// The message went back to its queue unprocessed.
    Released,
    /// A fault envelope could not be handled either; it was acked and logged.
    Discarded,
}

/// Drives one queue.
#[derive(Clone)]
pub struct QueueConsumer {
    queue: QueueName,
    transport: Arc<dyn QueueTransport>,
    bus: Arc<dyn MessageBus>,
    handler: Arc<dyn MessageHandler>,
    policy: RetryPolicy,
    concurrency: usize,
    idle_poll: Duration,
    clock: SharedClock,
}

impl QueueConsumer {
    /// Creates a consumer handling one message at a time.
    ///
    /// `bus` is where fault envelopes are published.
    #[must_use]
    pub fn new(
        queue: QueueName,
        transport: Arc<dyn QueueTransport>,
        bus: Arc<dyn MessageBus>,
        handler: Arc<dyn MessageHandler>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            transport,
            bus,
            handler,
            policy,
            concurrency: 1,
            idle_poll: DEFAULT_IDLE_POLL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the maximum number of messages handled at once.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Sets how long to wait after an empty receive.
    #[must_use]
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Sets the clock used to stamp fault envelopes.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// The queue this consumer drains.
    #[must_use]
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Consumes until `shutdown` fires, then waits for in-flight messages.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            queue = %self.queue,
            handler = self.handler.name(),
            concurrency = self.concurrency,
            "consumer started"
        );
        let mut tasks: JoinSet<Result<DeliveryOutcome, DeliveryError>> = JoinSet::new();

        loop {
            while let Some(joined) = tasks.try_join_next() {
                self.log_joined(joined);
            }

            let capacity = self.concurrency.saturating_sub(tasks.len());
            if capacity == 0 {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    Some(joined) = tasks.join_next() => self.log_joined(joined),
                }
                continue;
            }

            let received = tokio::select! {
                () = shutdown.cancelled() => break,
                received = self.transport.receive(&self.queue, capacity) => received,
            };

            match received {
                Ok(deliveries) if !deliveries.is_empty() => {
                    for delivery in deliveries {
                        let consumer = self.clone();
                        let token = shutdown.clone();
                        tasks.spawn(async move { consumer.process(delivery, &token).await });
                    }
                }
                Ok(_) => {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.idle_poll) => {}
                    }
                }
                Err(e) => {
                    warn!(queue = %self.queue, error = %e, "receive failed");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.idle_poll) => {}
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.log_joined(joined);
        }
        info!(queue = %self.queue, "consumer stopped");
    }

    /// Runs one delivery to completion: handled, faulted, released or
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the broker rejects the ack, the release or a
    /// lease renewal. The message is then redelivered once its lease lapses.
    #[instrument(
        skip(self, delivery, shutdown),
        fields(
            queue = %self.queue,
            delivery_id = %delivery.delivery_id,
            routing_key = %delivery.message.routing_key()
        )
    )]
    pub async fn process(
        &self,
        delivery: Delivery,
        shutdown: &CancellationToken,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempts = 0;

        let last_error = loop {
            attempts += 1;
            match self.handler.handle(&delivery.message).await {
                Ok(()) => {
                    self.transport.ack(&delivery).await?;
                    debug!(attempts, "message handled");
                    return Ok(DeliveryOutcome::Handled { attempts });
                }
                Err(e) if attempts >= max_attempts => break e,
                Err(e) => {
                    warn!(attempts, max_attempts, error = %e, "handler failed; retrying");
                    self.transport.renew(&delivery).await?;
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            self.transport.release(&delivery).await?;
                            return Ok(DeliveryOutcome::Released);
                        }
                        () = tokio::time::sleep(self.policy.retry_delay) => {}
                    }
                }
            }
        };

        match &delivery.message {
            BusMessage::Event(event) => {
                let envelope =
                    FaultEnvelope::new(event.clone(), &last_error, attempts, self.clock.now());
                if let Err(e) = self.bus.publish(&BusMessage::Fault(envelope)).await {
                    error!(error = %e, "fault envelope could not be published");
                    self.transport.release(&delivery).await?;
                    return Ok(DeliveryOutcome::Released);
                }
                self.transport.ack(&delivery).await?;
                warn!(attempts, error = %last_error, "retries exhausted; fault published");
                Ok(DeliveryOutcome::Faulted { attempts })
            }
            BusMessage::Fault(envelope) => {
                error!(
                    entity_id = %envelope.entity_id(),
                    attempts,
                    error = %last_error,
                    "fault envelope could not be handled; discarding"
                );
                self.transport.ack(&delivery).await?;
                Ok(DeliveryOutcome::Discarded)
            }
        }
    }

    fn log_joined(&self, joined: Result<Result<DeliveryOutcome, DeliveryError>, JoinError>) {
        match joined {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(queue = %self.queue, error = %e, "delivery left for redelivery"),
            Err(e) => error!(queue = %self.queue, error = %e, "delivery task panicked"),
        }
    }
}
