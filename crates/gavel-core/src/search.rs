//! Search queries: term, filter, ordering and paging over derived records.
//!
//! A query is plain data built from an enumerated set of filter and order
//! options. Evaluation is a pure function over records so every store can
//! either call [`SearchQuery::run`] directly or render the same options to its
//! own query language.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::derived::DerivedRecord;

/// How far ahead "ending soon" looks.
pub const ENDING_SOON_WINDOW_HOURS: i64 = 6;

/// Which auctions a query admits, by auction end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterBy {
    /// Bidding has closed.
    Finished,
    /// Bidding closes within the next six hours.
    EndingSoon,
    /// Bidding is still open.
    #[default]
    Live,
}

impl FilterBy {
    /// Whether `record` passes this filter at `now`.
    #[must_use]
    pub fn admits(self, record: &DerivedRecord, now: DateTime<Utc>) -> bool {
        match self {
            Self::Finished => record.auction_end < now,
            Self::EndingSoon => {
                record.auction_end > now
                    && record.auction_end < now + Duration::hours(ENDING_SOON_WINDOW_HOURS)
            }
            Self::Live => record.auction_end > now,
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    /// Alphabetical by make.
    Make,
    /// Newest first.
    New,
    /// Soonest-ending first.
    #[default]
    AuctionEnd,
}

impl OrderBy {
    /// Compares two records under this ordering, ties broken by id.
    #[must_use]
    pub fn compare(self, a: &DerivedRecord, b: &DerivedRecord) -> Ordering {
        let primary = match self {
            Self::Make => a.make.cmp(&b.make),
            Self::New => b.created_at.cmp(&a.created_at),
            Self::AuctionEnd => a.auction_end.cmp(&b.auction_end),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    /// Free-text term matched against make, model and color.
    pub search_term: Option<String>,
    /// Auction-end filter.
    pub filter_by: FilterBy,
    /// Result ordering.
    pub order_by: OrderBy,
    /// Restrict to one seller.
    pub seller: Option<String>,
    /// Restrict to one winner.
    pub winner: Option<String>,
    /// 1-based page number.
    pub page_number: usize,
    /// Results per page.
    pub page_size: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            search_term: None,
            filter_by: FilterBy::default(),
            order_by: OrderBy::default(),
            seller: None,
            winner: None,
            page_number: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchQuery {
    /// Page size used when none (or zero) is requested.
    pub const DEFAULT_PAGE_SIZE: usize = 4;

    /// Largest page size served; bigger requests are clamped to it.
    pub const MAX_PAGE_SIZE: usize = 100;

    /// Page size after defaulting and clamping.
    #[must_use]
    pub fn effective_page_size(&self) -> usize {
        if self.page_size == 0 {
            Self::DEFAULT_PAGE_SIZE
        } else {
            self.page_size.min(Self::MAX_PAGE_SIZE)
        }
    }

    /// Number of results skipped before the requested page. Saturates for
    /// page numbers past any addressable result.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.page_number
            .saturating_sub(1)
            .saturating_mul(self.effective_page_size())
    }

    /// Lower-cased, trimmed search term, if any.
    #[must_use]
    pub fn normalized_term(&self) -> Option<String> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether `record` satisfies every predicate of the query at `now`.
    #[must_use]
    pub fn matches(&self, record: &DerivedRecord, now: DateTime<Utc>) -> bool {
        let term_matches = self.normalized_term().is_none_or(|term| {
            [&record.make, &record.model, &record.color]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
        });
        let seller_matches = self
            .seller
            .as_deref()
            .is_none_or(|seller| record.seller == seller);
        let winner_matches = self
            .winner
            .as_deref()
            .is_none_or(|winner| record.winner.as_deref() == Some(winner));

        term_matches && seller_matches && winner_matches && self.filter_by.admits(record, now)
    }

    /// Filters, orders and pages `records`.
    #[must_use]
    pub fn run<I>(&self, records: I, now: DateTime<Utc>) -> SearchPage
    where
        I: IntoIterator<Item = DerivedRecord>,
    {
        let mut hits: Vec<DerivedRecord> = records
            .into_iter()
            .filter(|r| self.matches(r, now))
            .collect();
        hits.sort_by(|a, b| self.order_by.compare(a, b));

        let total_count = hits.len();
        let results = hits
            .into_iter()
            .skip(self.offset())
            .take(self.effective_page_size())
            .collect();

        SearchPage::new(results, total_count, self.effective_page_size())
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Records on this page.
    pub results: Vec<DerivedRecord>,
    /// Number of pages at the requested size.
    pub page_count: usize,
    /// Number of matching records across all pages.
    pub total_count: usize,
}

impl SearchPage {
    /// Builds a page, deriving the page count from `total_count`.
    #[must_use]
    pub fn new(results: Vec<DerivedRecord>, total_count: usize, page_size: usize) -> Self {
        Self {
            results,
            page_count: total_count.div_ceil(page_size.max(1)),
            total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn record(make: &str, ends_in: Duration, created_ago: Duration) -> DerivedRecord {
        DerivedRecord {
            id: Uuid::new_v4(),
            make: make.into(),
            model: "Model".into(),
            color: "Silver".into(),
            mileage: 10_000,
            year: 2020,
            seller: "alice".into(),
            winner: None,
            auction_end: now() + ends_in,
            created_at: now() - created_ago,
            updated_at: now() - created_ago,
        }
    }

    #[test]
    fn test_default_query_returns_live_auctions_soonest_first() {
        // Arrange
        let later = record("Ford", Duration::days(3), Duration::days(1));
        let sooner = record("Audi", Duration::days(1), Duration::days(2));
        let finished = record("BMW", -Duration::days(1), Duration::days(9));

        // Act
        let page = SearchQuery::default().run(
            vec![later.clone(), finished, sooner.clone()],
            now(),
        );

        // Assert
        assert_eq!(page.total_count, 2);
        assert_eq!(page.results, vec![sooner, later]);
    }

    #[test]
    fn test_ending_soon_only_admits_auctions_closing_within_window() {
        let soon = record("Ford", Duration::hours(2), Duration::days(1));
        let later = record("Audi", Duration::hours(7), Duration::days(1));
        let query = SearchQuery {
            filter_by: FilterBy::EndingSoon,
            ..SearchQuery::default()
        };

        let page = query.run(vec![soon.clone(), later], now());

        assert_eq!(page.results, vec![soon]);
    }

    #[test]
    fn test_finished_filter_with_make_order() {
        let b = record("BMW", -Duration::days(1), Duration::days(9));
        let a = record("Audi", -Duration::days(2), Duration::days(9));
        let query = SearchQuery {
            filter_by: FilterBy::Finished,
            order_by: OrderBy::Make,
            ..SearchQuery::default()
        };

        let page = query.run(vec![b.clone(), a.clone()], now());

        assert_eq!(page.results, vec![a, b]);
    }

    #[test]
    fn test_new_order_puts_most_recently_created_first() {
        let old = record("Ford", Duration::days(1), Duration::days(5));
        let new = record("Ford", Duration::days(2), Duration::days(1));
        let query = SearchQuery {
            order_by: OrderBy::New,
            ..SearchQuery::default()
        };

        let page = query.run(vec![old.clone(), new.clone()], now());

        assert_eq!(page.results, vec![new, old]);
    }

    #[test]
    fn test_search_term_is_case_insensitive_over_make_model_and_color() {
        let mut red = record("Ford", Duration::days(1), Duration::days(1));
        red.color = "Red".into();
        let other = record("Audi", Duration::days(1), Duration::days(1));
        let query = SearchQuery {
            search_term: Some("  rEd ".into()),
            ..SearchQuery::default()
        };

        let page = query.run(vec![red.clone(), other], now());

        assert_eq!(page.results, vec![red]);
    }

    #[test]
    fn test_seller_and_winner_filters() {
        let mut won = record("Ford", -Duration::days(1), Duration::days(3));
        won.winner = Some("bob".into());
        let mut other_seller = won.clone();
        other_seller.id = Uuid::new_v4();
        other_seller.seller = "carol".into();
        let query = SearchQuery {
            filter_by: FilterBy::Finished,
            seller: Some("alice".into()),
            winner: Some("bob".into()),
            ..SearchQuery::default()
        };

        let page = query.run(vec![won.clone(), other_seller], now());

        assert_eq!(page.results, vec![won]);
    }

    #[test]
    fn test_paging_reports_page_count_and_slices_results() {
        let records: Vec<DerivedRecord> = (1..=5)
            .map(|i| record("Ford", Duration::hours(i), Duration::days(1)))
            .collect();
        let query = SearchQuery {
            page_number: 2,
            page_size: 2,
            ..SearchQuery::default()
        };

        let page = query.run(records.clone(), now());

        assert_eq!(page.total_count, 5);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.results, records[2..4].to_vec());
    }

    #[test]
    fn test_huge_page_number_yields_an_empty_page() {
        // Arrange
        let query = SearchQuery {
            page_number: usize::MAX,
            page_size: 4,
            ..SearchQuery::default()
        };

        // Act
        let page = query.run(
            vec![record("Ford", Duration::days(1), Duration::days(1))],
            now(),
        );

        // Assert
        assert_eq!(query.offset(), usize::MAX);
        assert!(page.results.is_empty());
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let query = SearchQuery {
            page_size: usize::MAX,
            ..SearchQuery::default()
        };

        assert_eq!(query.effective_page_size(), SearchQuery::MAX_PAGE_SIZE);
    }

    #[test]
    fn test_zero_page_size_falls_back_to_default() {
        let query = SearchQuery {
            page_size: 0,
            page_number: 0,
            ..SearchQuery::default()
        };

        assert_eq!(query.effective_page_size(), SearchQuery::DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }
}
