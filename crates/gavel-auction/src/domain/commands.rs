//! Commands for the auction context.

use chrono::{DateTime, Utc};
use gavel_core::error::DomainError;
use serde::Deserialize;
use uuid::Uuid;

/// Command to open a new auction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuction {
    /// The correlation ID for tracing.
    #[serde(default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
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
    /// When bidding closes.
    pub auction_end: DateTime<Utc>,
}

impl CreateAuction {
    /// Checks the fields the auction service itself insists on.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the seller is blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.seller.trim().is_empty() {
            return Err(DomainError::Validation("seller must not be blank".into()));
        }
        Ok(())
    }
}

/// Command to change the mutable attributes of an auction. Absent fields keep
/// their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuction {
    /// The correlation ID for tracing.
    #[serde(default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
    /// The auction to change; taken from the request path.
    #[serde(skip)]
    pub auction_id: Uuid,
    /// New vehicle make.
    pub make: Option<String>,
    /// New vehicle model.
    pub model: Option<String>,
    /// New vehicle color.
    pub color: Option<String>,
    /// New odometer reading.
    pub mileage: Option<i32>,
    /// New model year.
    pub year: Option<i32>,
}

impl UpdateAuction {
    /// Whether the command changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.color.is_none()
            && self.mileage.is_none()
            && self.year.is_none()
    }
}

/// Command to remove an auction.
#[derive(Debug, Clone)]
pub struct DeleteAuction {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The auction to remove.
    pub auction_id: Uuid,
}
