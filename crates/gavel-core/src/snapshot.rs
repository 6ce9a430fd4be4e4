//! Wire format of the reconciliation contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full derived-field view of one auction, as served by
/// `GET /records?updatedSince=`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSnapshot {
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
    #[serde(default)]
    pub winner: Option<String>,
    /// When bidding closes.
    pub auction_end: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Authoritative last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}
