//! Explicit mappings between commands, auction records and the messages
//! built from them.

use chrono::{DateTime, Utc};
use gavel_core::auction::AuctionRecord;
use gavel_core::event::{AuctionCreated, AuctionDeleted, AuctionUpdated, DomainEvent};
use gavel_core::snapshot::RecordSnapshot;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::commands::{CreateAuction, UpdateAuction};

/// Read-only view of an auction as served by the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionView {
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
    /// Winner username, once known.
    pub winner: Option<String>,
    /// When bidding closes.
    pub auction_end: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Builds the record a `CreateAuction` command produces.
#[must_use]
pub fn new_record(command: &CreateAuction, id: Uuid, now: DateTime<Utc>) -> AuctionRecord {
    AuctionRecord {
        id,
        make: command.make.clone(),
        model: command.model.clone(),
        color: command.color.clone(),
        mileage: command.mileage,
        year: command.year,
        seller: command.seller.clone(),
        winner: None,
        auction_end: command.auction_end,
        created_at: now,
        updated_at: now,
    }
}

/// Applies `command` to `current`, keeping every field the command leaves
/// out.
#[must_use]
pub fn updated_record(
    current: &AuctionRecord,
    command: &UpdateAuction,
    now: DateTime<Utc>,
) -> AuctionRecord {
    AuctionRecord {
        make: command.make.clone().unwrap_or_else(|| current.make.clone()),
        model: command.model.clone().unwrap_or_else(|| current.model.clone()),
        color: command.color.clone().unwrap_or_else(|| current.color.clone()),
        mileage: command.mileage.unwrap_or(current.mileage),
        year: command.year.unwrap_or(current.year),
        updated_at: now,
        ..current.clone()
    }
}

/// The `Created` event for a freshly inserted record.
#[must_use]
pub fn created_event(record: &AuctionRecord) -> DomainEvent {
    DomainEvent::Created(AuctionCreated {
        id: record.id,
        make: record.make.clone(),
        model: record.model.clone(),
        color: record.color.clone(),
        mileage: record.mileage,
        year: record.year,
        seller: record.seller.clone(),
        winner: record.winner.clone(),
        auction_end: record.auction_end,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

/// The `Updated` event for `record` after `command` was applied. Only the
/// fields the command touched are carried, with their post-update values.
#[must_use]
pub fn updated_event(record: &AuctionRecord, command: &UpdateAuction) -> DomainEvent {
    DomainEvent::Updated(AuctionUpdated {
        id: record.id,
        make: command.make.as_ref().map(|_| record.make.clone()),
        model: command.model.as_ref().map(|_| record.model.clone()),
        color: command.color.as_ref().map(|_| record.color.clone()),
        mileage: command.mileage.map(|_| record.mileage),
        year: command.year.map(|_| record.year),
        updated_at: record.updated_at,
    })
}

/// The `Deleted` event for auction `id`.
#[must_use]
pub fn deleted_event(id: Uuid) -> DomainEvent {
    DomainEvent::Deleted(AuctionDeleted { id })
}

/// The reconciliation snapshot of `record`.
#[must_use]
pub fn to_snapshot(record: &AuctionRecord) -> RecordSnapshot {
    RecordSnapshot {
        id: record.id,
        make: record.make.clone(),
        model: record.model.clone(),
        color: record.color.clone(),
        mileage: record.mileage,
        year: record.year,
        seller: record.seller.clone(),
        winner: record.winner.clone(),
        auction_end: record.auction_end,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

/// The HTTP view of `record`.
#[must_use]
pub fn to_view(record: &AuctionRecord) -> AuctionView {
    AuctionView {
        id: record.id,
        make: record.make.clone(),
        model: record.model.clone(),
        color: record.color.clone(),
        mileage: record.mileage,
        year: record.year,
        seller: record.seller.clone(),
        winner: record.winner.clone(),
        auction_end: record.auction_end,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn create_command() -> CreateAuction {
        CreateAuction {
            correlation_id: Uuid::new_v4(),
            make: "Ford".into(),
            model: "F150".into(),
            color: "Black".into(),
            mileage: 1000,
            year: 2020,
            seller: "alice".into(),
            auction_end: now() + Duration::days(7),
        }
    }

    #[test]
    fn test_new_record_stamps_both_timestamps_and_has_no_winner() {
        let id = Uuid::new_v4();

        let record = new_record(&create_command(), id, now());

        assert_eq!(record.id, id);
        assert_eq!(record.make, "Ford");
        assert_eq!(record.created_at, now());
        assert_eq!(record.updated_at, now());
        assert!(record.winner.is_none());
    }

    #[test]
    fn test_updated_record_keeps_absent_fields() {
        let current = new_record(&create_command(), Uuid::new_v4(), now());
        let later = now() + Duration::hours(1);
        let command = UpdateAuction {
            model: Some("FooBar".into()),
            ..UpdateAuction::default()
        };

        let updated = updated_record(&current, &command, later);

        assert_eq!(updated.model, "FooBar");
        assert_eq!(updated.make, current.make);
        assert_eq!(updated.mileage, current.mileage);
        assert_eq!(updated.created_at, current.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_updated_event_carries_only_touched_fields() {
        let current = new_record(&create_command(), Uuid::new_v4(), now());
        let command = UpdateAuction {
            color: Some("Red".into()),
            mileage: Some(1500),
            ..UpdateAuction::default()
        };
        let record = updated_record(&current, &command, now());

        let DomainEvent::Updated(event) = updated_event(&record, &command) else {
            panic!("expected an Updated event");
        };

        assert_eq!(event.id, record.id);
        assert_eq!(event.color.as_deref(), Some("Red"));
        assert_eq!(event.mileage, Some(1500));
        assert!(event.make.is_none());
        assert!(event.model.is_none());
        assert!(event.year.is_none());
        assert_eq!(event.updated_at, record.updated_at);
    }

    #[test]
    fn test_created_event_and_snapshot_mirror_the_record() {
        let record = new_record(&create_command(), Uuid::new_v4(), now());

        let DomainEvent::Created(event) = created_event(&record) else {
            panic!("expected a Created event");
        };
        let snapshot = to_snapshot(&record);

        assert_eq!(event.id, record.id);
        assert_eq!(event.seller, record.seller);
        assert_eq!(event.auction_end, record.auction_end);
        assert_eq!(snapshot.id, record.id);
        assert_eq!(snapshot.model, record.model);
        assert_eq!(snapshot.updated_at, record.updated_at);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let record = new_record(&create_command(), Uuid::new_v4(), now());

        let json = serde_json::to_value(to_view(&record)).unwrap();

        assert_eq!(json["make"], "Ford");
        assert!(json.get("auctionEnd").is_some());
        assert!(json.get("updatedAt").is_some());
    }
}
