//! The authoritative auction record and its read port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// An auction as stored by the auction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Stable identifier.
    pub id: Uuid,
    /// Vehicle make.
    pub make: String,
    /// Vehicle model.
    pub model: String,
    /// Vehicle color.
    pub color: String,
    /// Odometer reading.
    pub mileage: i32,
    /// Model year.
    pub year: i32,
    /// Seller username.
    pub seller: String,
    /// Winner username, once known.
    pub winner: Option<String>,
    /// When bidding closes.
    pub auction_end: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp; drives the reconciliation watermark.
    pub updated_at: DateTime<Utc>,
}

/// Read access to authoritative auctions.
#[async_trait]
pub trait AuctionRepository: Send + Sync {
    /// Loads one auction.
    async fn find(&self, id: Uuid) -> Result<Option<AuctionRecord>, DomainError>;

    /// Lists auctions updated strictly after `since` (all when `None`),
    /// ordered by make.
    async fn updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuctionRecord>, DomainError>;
}
