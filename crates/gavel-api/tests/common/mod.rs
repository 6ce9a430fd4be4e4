//! Shared helpers for the API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use gavel_api::routes;
use gavel_api::state::{AuctionState, SearchState};
use gavel_auction::application::fault_router::FaultRouter;
use gavel_auction::application::relay::OutboxRelay;
use gavel_bus::consumer::{QueueConsumer, RetryPolicy};
use gavel_bus::in_memory::InMemoryBus;
use gavel_bus::topology::{AUCTION_SERVICE, QueueName, SEARCH_SERVICE, Topology};
use gavel_bus::transport::QueueTransport;
use gavel_core::clock::SharedClock;
use gavel_core::config::PipelineConfig;
use gavel_core::event::EventKind;
use gavel_search::application::dispatcher::Dispatcher;
use gavel_test_support::{
    FixedClock, InMemoryAuctionStore, InMemorySearchStore, RecordingAlertSink,
};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Fixed timestamp used across the integration tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Both services wired together over an in-memory bus, with the background
/// workers driven by hand.
pub struct Pipeline {
    pub auctions: Arc<InMemoryAuctionStore>,
    pub search: Arc<InMemorySearchStore>,
    pub bus: InMemoryBus,
    pub alerts: Arc<RecordingAlertSink>,
    pub clock: SharedClock,
    relay: OutboxRelay,
    consumers: Vec<QueueConsumer>,
    token: CancellationToken,
}

impl Pipeline {
    pub fn new() -> Self {
        let auctions = Arc::new(InMemoryAuctionStore::new());
        let search = Arc::new(InMemorySearchStore::new());
        let bus = InMemoryBus::new(Topology::auction_search());
        let alerts = Arc::new(RecordingAlertSink::new());
        let clock: SharedClock = Arc::new(FixedClock(now()));
        let config = PipelineConfig {
            retry_count: 1,
            retry_delay: Duration::ZERO,
            ..PipelineConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);

        let relay = OutboxRelay::new(
            auctions.clone(),
            Arc::new(bus.clone()),
            clock.clone(),
            &config,
        );

        let dispatcher = Arc::new(Dispatcher::new(search.clone()));
        let router = Arc::new(FaultRouter::new(
            Arc::new(bus.clone()),
            alerts.clone(),
            clock.clone(),
            config.fault_escalation_window,
        ));

        let mut consumers = Vec::new();
        for kind in EventKind::ALL {
            consumers.push(QueueConsumer::new(
                QueueName::for_events(AUCTION_SERVICE, SEARCH_SERVICE, kind),
                Arc::new(bus.clone()),
                Arc::new(bus.clone()),
                dispatcher.clone(),
                policy,
            ));
            consumers.push(QueueConsumer::new(
                QueueName::for_faults(SEARCH_SERVICE, AUCTION_SERVICE, kind),
                Arc::new(bus.clone()),
                Arc::new(bus.clone()),
                router.clone(),
                policy,
            ));
        }

        Self {
            auctions,
            search,
            bus,
            alerts,
            clock,
            relay,
            consumers,
            token: CancellationToken::new(),
        }
    }

    pub fn auction_app(&self) -> Router {
        routes::auction_app(AuctionState::new(
            self.clock.clone(),
            self.auctions.clone(),
            self.auctions.clone(),
        ))
    }

    pub fn search_app(&self) -> Router {
        routes::search_app(SearchState::new(self.clock.clone(), self.search.clone()))
    }

    /// Relays the outbox and drains every queue until nothing moves.
    pub async fn settle(&self) {
        for _ in 0..10 {
            let mut moved = self.relay.run_cycle().await.unwrap();
            for consumer in &self.consumers {
                for delivery in self.bus.receive(consumer.queue(), 16).await.unwrap() {
                    consumer.process(delivery, &self.token).await.unwrap();
                    moved += 1;
                }
            }
            if moved == 0 {
                return;
            }
        }
        panic!("pipeline did not settle");
    }
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    read(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    read(app, request).await
}

/// Send a DELETE request and return the status.
pub async fn delete(app: Router, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    read(app, request).await.0
}

async fn read(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };
    (status, json)
}

/// A create-auction request body.
pub fn create_body(make: &str, model: &str, color: &str) -> serde_json::Value {
    serde_json::json!({
        "make": make,
        "model": model,
        "color": color,
        "mileage": 1000,
        "year": 2020,
        "seller": "alice",
        "auctionEnd": "2026-01-22T10:00:00Z"
    })
}
