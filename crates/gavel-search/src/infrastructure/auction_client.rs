//! HTTP client for the auction service's reconciliation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use gavel_core::derived::AuthoritativeSource;
use gavel_core::error::ReconcileError;
use gavel_core::snapshot::RecordSnapshot;
use reqwest::Url;
use tracing::debug;

/// Pulls record snapshots from `GET {base}/records?updatedSince=`.
#[derive(Debug, Clone)]
pub struct AuctionServiceClient {
    records_url: Url,
    client: reqwest::Client,
}

impl AuctionServiceClient {
    /// Creates a client for the auction service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Unavailable` if `base_url` is not a valid URL
    /// or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReconcileError> {
        let records_url = Url::parse(&format!("{}/records", base_url.trim_end_matches('/')))
            .map_err(|e| ReconcileError::Unavailable(format!("invalid auction service url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReconcileError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            records_url,
            client,
        })
    }

    fn url_for(&self, since: Option<DateTime<Utc>>) -> Url {
        let mut url = self.records_url.clone();
        if let Some(since) = since {
            url.query_pairs_mut().append_pair(
                "updatedSince",
                &since.to_rfc3339_opts(SecondsFormat::Micros, true),
            );
        }
        url
    }
}

#[async_trait]
impl AuthoritativeSource for AuctionServiceClient {
    async fn records_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RecordSnapshot>, ReconcileError> {
        let url = self.url_for(since);
        debug!(%url, "pulling auction records");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReconcileError::Unavailable(format!("records request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReconcileError::Unavailable(format!(
                "records request returned {status}"
            )));
        }

        response
            .json::<Vec<RecordSnapshot>>()
            .await
            .map_err(|e| ReconcileError::Unavailable(format!("invalid records response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn snapshot() -> RecordSnapshot {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        RecordSnapshot {
            id: Uuid::new_v4(),
            make: "Ford".into(),
            model: "GT".into(),
            color: "White".into(),
            mileage: 65_125,
            year: 2020,
            seller: "bob".into(),
            winner: None,
            auction_end: at + chrono::Duration::days(3),
            created_at: at,
            updated_at: at,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    type Seen = Arc<Mutex<Vec<Option<String>>>>;

    async fn spawn_records_server(records: Vec<RecordSnapshot>) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/records",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let records = records.clone();
                let recorder = recorder.clone();
                async move {
                    recorder
                        .lock()
                        .unwrap()
                        .push(params.get("updatedSince").cloned());
                    axum::Json(records)
                }
            }),
        );
        (serve(app).await, seen)
    }

    #[tokio::test]
    async fn test_full_pull_sends_no_watermark() {
        // Arrange
        let expected = vec![snapshot()];
        let (base_url, seen) = spawn_records_server(expected.clone()).await;
        let client = AuctionServiceClient::new(&base_url, Duration::from_secs(5)).unwrap();

        // Act
        let records = client.records_updated_since(None).await.unwrap();

        // Assert
        assert_eq!(records, expected);
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_watermark_is_sent_as_rfc3339() {
        let (base_url, seen) = spawn_records_server(Vec::new()).await;
        let client = AuctionServiceClient::new(&format!("{base_url}/"), Duration::from_secs(5))
            .unwrap();
        let since = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();

        client.records_updated_since(Some(since)).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        let sent = seen[0].clone().unwrap();
        assert_eq!(DateTime::parse_from_rfc3339(&sent).unwrap(), since);
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let app = Router::new().route(
            "/records",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base_url = serve(app).await;
        let client = AuctionServiceClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let result = client.records_updated_since(None).await;

        assert!(matches!(result, Err(ReconcileError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client =
            AuctionServiceClient::new(&format!("http://{addr}"), Duration::from_secs(1)).unwrap();

        let result = client.records_updated_since(None).await;

        assert!(matches!(result, Err(ReconcileError::Unavailable(_))));
    }
}
