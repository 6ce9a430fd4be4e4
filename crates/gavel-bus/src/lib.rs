//! Gavel Bus: durable queues between the auction and search services.
//!
//! Publishing goes through [`gavel_core::bus::MessageBus`]; receiving goes
//! through [`transport::QueueTransport`]. A [`consumer::QueueConsumer`] drives
//! one queue: it runs a bounded pool of handler tasks, retries failures per its
//! [`consumer::RetryPolicy`] and turns exhausted events into fault envelopes.

pub mod consumer;
pub mod in_memory;
pub mod postgres;
pub mod topology;
pub mod transport;
