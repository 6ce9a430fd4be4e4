//! Domain events published by the auction service.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when an auction is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionCreated {
    /// The auction identifier.
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
    /// Winner username, once the auction has one.
    pub winner: Option<String>,
    /// When bidding closes.
    pub auction_end: DateTime<Utc>,
    /// When the auction was created.
    pub created_at: DateTime<Utc>,
    /// Authoritative last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when the mutable attributes of an auction change.
///
/// Absent fields were not part of the change and must be left untouched by
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionUpdated {
    /// The auction identifier.
    pub id: Uuid,
    /// New vehicle make.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    /// New vehicle model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// New vehicle color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// New odometer reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<i32>,
    /// New model year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Authoritative last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when an auction is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDeleted {
    /// The auction identifier.
    pub id: Uuid,
}

/// A state change of one auction, as seen by downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DomainEvent {
    /// The auction was created.
    Created(AuctionCreated),
    /// Mutable attributes of the auction changed.
    Updated(AuctionUpdated),
    /// The auction was deleted.
    Deleted(AuctionDeleted),
}

impl DomainEvent {
    /// Returns the stable identifier of the entity this event describes.
    #[must_use]
    pub fn entity_id(&self) -> Uuid {
        match self {
            Self::Created(e) => e.id,
            Self::Updated(e) => e.id,
            Self::Deleted(e) => e.id,
        }
    }

    /// Returns the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Updated(_) => EventKind::Updated,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }
}

/// The kinds of [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// See [`AuctionCreated`].
    Created,
    /// See [`AuctionUpdated`].
    Updated,
    /// See [`AuctionDeleted`].
    Deleted,
}

impl EventKind {
    /// All event kinds, in declaration order.
    pub const ALL: [Self; 3] = [Self::Created, Self::Updated, Self::Deleted];

    /// Returns the kebab-case name used in queue names and routing keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Attributes a consumer is allowed to overwrite from an update event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutableField {
    /// Vehicle make.
    Make,
    /// Vehicle model.
    Model,
    /// Vehicle color.
    Color,
    /// Odometer reading.
    Mileage,
    /// Model year.
    Year,
}

impl MutableField {
    /// The merge whitelist, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Make,
        Self::Model,
        Self::Color,
        Self::Mileage,
        Self::Year,
    ];

    /// Returns the field name as it appears on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Make => "make",
            Self::Model => "model",
            Self::Color => "color",
            Self::Mileage => "mileage",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for MutableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
