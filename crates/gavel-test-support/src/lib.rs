//! Shared test fakes and utilities for the Gavel pipeline.

mod bus;
mod clock;
mod repository;
mod source;

pub use bus::{RecordingAlertSink, RecordingBus};
pub use clock::{FixedClock, ManualClock};
pub use repository::{FailingSearchStore, InMemoryAuctionStore, InMemorySearchStore};
pub use source::ScriptedSource;
