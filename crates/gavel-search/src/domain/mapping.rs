//! Mappings from events and snapshots to the search projection.

use gavel_core::derived::{DerivedRecord, FieldPatch};
use gavel_core::event::{AuctionCreated, AuctionUpdated};
use gavel_core::snapshot::RecordSnapshot;

/// The projection row a `Created` event describes.
#[must_use]
pub fn record_from_created(event: &AuctionCreated) -> DerivedRecord {
    DerivedRecord {
        id: event.id,
        make: event.make.clone(),
        model: event.model.clone(),
        color: event.color.clone(),
        mileage: event.mileage,
        year: event.year,
        seller: event.seller.clone(),
        winner: event.winner.clone(),
        auction_end: event.auction_end,
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

/// The partial merge an `Updated` event describes. Only whitelisted mutable
/// fields are carried over.
#[must_use]
pub fn patch_from_updated(event: &AuctionUpdated) -> FieldPatch {
    FieldPatch {
        make: event.make.clone(),
        model: event.model.clone(),
        color: event.color.clone(),
        mileage: event.mileage,
        year: event.year,
        updated_at: Some(event.updated_at),
    }
}

/// The projection row for an authoritative snapshot; every field is taken.
#[must_use]
pub fn record_from_snapshot(snapshot: RecordSnapshot) -> DerivedRecord {
    DerivedRecord {
        id: snapshot.id,
        make: snapshot.make,
        model: snapshot.model,
        color: snapshot.color,
        mileage: snapshot.mileage,
        year: snapshot.year,
        seller: snapshot.seller,
        winner: snapshot.winner,
        auction_end: snapshot.auction_end,
        created_at: snapshot.created_at,
        updated_at: snapshot.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_patch_carries_only_present_fields() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let event = AuctionUpdated {
            id: Uuid::new_v4(),
            model: Some("FooBar".into()),
            updated_at: at,
            ..AuctionUpdated::default()
        };

        let patch = patch_from_updated(&event);

        assert_eq!(patch.model.as_deref(), Some("FooBar"));
        assert!(patch.make.is_none());
        assert!(patch.mileage.is_none());
        assert_eq!(patch.updated_at, Some(at));
    }

    #[test]
    fn test_snapshot_maps_every_field() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let snapshot = RecordSnapshot {
            id: Uuid::new_v4(),
            make: "Ford".into(),
            model: "GT".into(),
            color: "White".into(),
            mileage: 65_125,
            year: 2020,
            seller: "bob".into(),
            winner: Some("carol".into()),
            auction_end: at + Duration::days(3),
            created_at: at,
            updated_at: at + Duration::hours(1),
        };

        let record = record_from_snapshot(snapshot.clone());

        assert_eq!(record.id, snapshot.id);
        assert_eq!(record.winner, snapshot.winner);
        assert_eq!(record.mileage, 65_125);
        assert_eq!(record.updated_at, snapshot.updated_at);
    }
}
