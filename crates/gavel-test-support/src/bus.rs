//! Test bus and alert sink: recording `MessageBus` and `AlertSink`
//! implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use gavel_core::bus::{BusMessage, MessageBus};
use gavel_core::error::DeliveryError;
use gavel_core::fault::{AlertSink, FaultAlert};

/// A bus that records every accepted message instead of routing it.
///
/// Can be told to refuse publishes, either always or after a number of
/// successes.
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<BusMessage>>,
    successes_left: Mutex<Option<usize>>,
}

impl RecordingBus {
    /// Create a bus that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that refuses every publish.
    #[must_use]
    pub fn failing() -> Self {
        Self::fail_after(0)
    }

    /// Create a bus that accepts `successes` publishes and refuses the rest.
    #[must_use]
    pub fn fail_after(successes: usize) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            successes_left: Mutex::new(Some(successes)),
        }
    }

    /// Returns a snapshot of every accepted message, in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<BusMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, message: &BusMessage) -> Result<(), DeliveryError> {
        {
            let mut left = self.successes_left.lock().unwrap();
            match left.as_mut() {
                Some(0) => return Err(DeliveryError::Unavailable("broker offline".into())),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// An alert sink that keeps every alert it is given.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<FaultAlert>>,
}

impl RecordingAlertSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded alerts.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn alerts(&self) -> Vec<FaultAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn record(&self, alert: FaultAlert) {
        self.alerts.lock().unwrap().push(alert);
    }
}
