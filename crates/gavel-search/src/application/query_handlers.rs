//! Query handlers for the search projection.

use gavel_core::clock::Clock;
use gavel_core::derived::DerivedStore;
use gavel_core::error::DomainError;
use gavel_core::search::{SearchPage, SearchQuery};

/// Runs `query` against the projection, evaluating time filters at the
/// clock's current time.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store fails.
pub async fn search(
    query: &SearchQuery,
    clock: &dyn Clock,
    store: &dyn DerivedStore,
) -> Result<SearchPage, DomainError> {
    store.search(query, clock.now()).await
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use gavel_core::derived::DerivedRecord;
    use gavel_core::error::DomainError;
    use gavel_core::search::{FilterBy, OrderBy, SearchQuery};
    use gavel_test_support::{FailingSearchStore, FixedClock, InMemorySearchStore};
    use uuid::Uuid;

    use super::search;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn record(make: &str, model: &str, seller: &str, ends_in_hours: i64) -> DerivedRecord {
        DerivedRecord {
            id: Uuid::new_v4(),
            make: make.into(),
            model: model.into(),
            color: "Black".into(),
            mileage: 1000,
            year: 2020,
            seller: seller.into(),
            winner: None,
            auction_end: now() + Duration::hours(ends_in_hours),
            created_at: now() - Duration::days(1),
            updated_at: now() - Duration::days(1),
        }
    }

    fn store() -> InMemorySearchStore {
        InMemorySearchStore::with_records(vec![
            record("Ford", "F150", "alice", 48),
            record("Audi", "R8", "bob", 3),
            record("Bugatti", "Veyron", "alice", -2),
            record("Mercedes", "SLK", "carol", 100),
        ])
    }

    #[tokio::test]
    async fn test_default_query_returns_live_auctions_soonest_first() {
        // Arrange
        let store = store();

        // Act
        let page = search(&SearchQuery::default(), &FixedClock(now()), &store)
            .await
            .unwrap();

        // Assert
        let makes: Vec<&str> = page.results.iter().map(|r| r.make.as_str()).collect();
        assert_eq!(makes, vec!["Audi", "Ford", "Mercedes"]);
        assert_eq!(page.total_count, 3);
        assert_eq!(page.page_count, 1);
    }

    #[tokio::test]
    async fn test_term_seller_and_filter_combine() {
        let store = store();
        let query = SearchQuery {
            search_term: Some("veyron".into()),
            seller: Some("alice".into()),
            filter_by: FilterBy::Finished,
            ..SearchQuery::default()
        };

        let page = search(&query, &FixedClock(now()), &store).await.unwrap();

        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].make, "Bugatti");
    }

    #[tokio::test]
    async fn test_pages_are_counted_from_total_matches() {
        let store = store();
        let query = SearchQuery {
            order_by: OrderBy::Make,
            page_size: 2,
            page_number: 2,
            ..SearchQuery::default()
        };

        let page = search(&query, &FixedClock(now()), &store).await.unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].make, "Mercedes");
    }

    #[tokio::test]
    async fn test_store_failure_is_propagated() {
        let result = search(
            &SearchQuery::default(),
            &FixedClock(now()),
            &FailingSearchStore,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
