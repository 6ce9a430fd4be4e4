//! Shared application state.

use std::sync::Arc;

use gavel_core::auction::AuctionRepository;
use gavel_core::clock::SharedClock;
use gavel_core::derived::DerivedStore;
use gavel_core::outbox::OutboxStore;

/// State shared across the auction service's request handlers.
#[derive(Clone)]
pub struct AuctionState {
    /// Clock for timestamps.
    pub clock: SharedClock,
    /// Read access to auctions.
    pub auctions: Arc<dyn AuctionRepository>,
    /// Transactional write path.
    pub outbox: Arc<dyn OutboxStore>,
}

impl AuctionState {
    /// Create new auction service state.
    #[must_use]
    pub fn new(
        clock: SharedClock,
        auctions: Arc<dyn AuctionRepository>,
        outbox: Arc<dyn OutboxStore>,
    ) -> Self {
        Self {
            clock,
            auctions,
            outbox,
        }
    }
}

/// State shared across the search service's request handlers.
#[derive(Clone)]
pub struct SearchState {
    /// Clock the time filters are evaluated against.
    pub clock: SharedClock,
    /// The search projection.
    pub store: Arc<dyn DerivedStore>,
}

impl SearchState {
    /// Create new search service state.
    #[must_use]
    pub fn new(clock: SharedClock, store: Arc<dyn DerivedStore>) -> Self {
        Self { clock, store }
    }
}
