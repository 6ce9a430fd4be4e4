//! Field rules the search projection enforces on incoming events.

use gavel_core::error::ApplyError;
use gavel_core::event::{AuctionCreated, AuctionUpdated, MutableField};

/// Oldest model year accepted.
pub const MIN_YEAR: i32 = 1886;
/// Newest model year accepted.
pub const MAX_YEAR: i32 = 2100;

fn invalid(field: MutableField, reason: impl Into<String>) -> ApplyError {
    ApplyError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn check_text(field: MutableField, value: &str) -> Result<(), ApplyError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be blank"));
    }
    Ok(())
}

fn check_mileage(mileage: i32) -> Result<(), ApplyError> {
    if mileage < 0 {
        return Err(invalid(MutableField::Mileage, format!("{mileage} is negative")));
    }
    Ok(())
}

fn check_year(year: i32) -> Result<(), ApplyError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(invalid(
            MutableField::Year,
            format!("{year} is outside {MIN_YEAR}..={MAX_YEAR}"),
        ));
    }
    Ok(())
}

/// Checks every mutable field of a `Created` event.
///
/// # Errors
///
/// Returns `ApplyError::InvalidField` for the first field that fails.
pub fn check_created(event: &AuctionCreated) -> Result<(), ApplyError> {
    check_text(MutableField::Make, &event.make)?;
    check_text(MutableField::Model, &event.model)?;
    check_text(MutableField::Color, &event.color)?;
    check_mileage(event.mileage)?;
    check_year(event.year)
}

/// Checks the fields an `Updated` event carries; absent fields are skipped.
///
/// # Errors
///
/// Returns `ApplyError::InvalidField` for the first field that fails.
pub fn check_updated(event: &AuctionUpdated) -> Result<(), ApplyError> {
    if let Some(make) = &event.make {
        check_text(MutableField::Make, make)?;
    }
    if let Some(model) = &event.model {
        check_text(MutableField::Model, model)?;
    }
    if let Some(color) = &event.color {
        check_text(MutableField::Color, color)?;
    }
    if let Some(mileage) = event.mileage {
        check_mileage(mileage)?;
    }
    if let Some(year) = event.year {
        check_year(year)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn field_of(err: ApplyError) -> MutableField {
        match err {
            ApplyError::InvalidField { field, .. } => field,
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_text_is_rejected_per_field() {
        let event = AuctionUpdated {
            id: Uuid::new_v4(),
            color: Some("  ".into()),
            ..AuctionUpdated::default()
        };

        assert_eq!(field_of(check_updated(&event).unwrap_err()), MutableField::Color);
    }

    #[test]
    fn test_negative_mileage_and_out_of_range_year_are_rejected() {
        let mileage = AuctionUpdated {
            mileage: Some(-1),
            ..AuctionUpdated::default()
        };
        let year = AuctionUpdated {
            year: Some(1700),
            ..AuctionUpdated::default()
        };

        assert_eq!(field_of(check_updated(&mileage).unwrap_err()), MutableField::Mileage);
        assert_eq!(field_of(check_updated(&year).unwrap_err()), MutableField::Year);
    }

    #[test]
    fn test_absent_fields_are_not_checked() {
        let event = AuctionUpdated {
            model: Some("FooBar".into()),
            ..AuctionUpdated::default()
        };

        assert!(check_updated(&event).is_ok());
    }
}
