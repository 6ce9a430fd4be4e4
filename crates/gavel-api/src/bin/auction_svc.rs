//! Gavel auction service entry point.
//!
//! Serves the auction API, relays the outbox onto the bus and routes the
//! search service's fault envelopes.

use std::sync::Arc;

use gavel_api::error::AppError;
use gavel_api::routes;
use gavel_api::settings::ServiceSettings;
use gavel_api::shutdown;
use gavel_api::state::AuctionState;
use gavel_api::telemetry;
use gavel_auction::application::fault_router::{FaultRouter, TracingAlertSink};
use gavel_auction::application::relay::OutboxRelay;
use gavel_bus::consumer::{QueueConsumer, RetryPolicy};
use gavel_bus::postgres::PgBus;
use gavel_bus::topology::{AUCTION_SERVICE, QueueName, SEARCH_SERVICE, Topology};
use gavel_core::clock::{SharedClock, SystemClock};
use gavel_core::event::EventKind;
use gavel_store::PgAuctionStore;
use gavel_store::schema::MIGRATOR;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 7001;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let telemetry = telemetry::init("gavel-auction")?;
    info!("Starting Gavel auction service");

    let settings = ServiceSettings::from_env(DEFAULT_PORT)?;
    let pipeline = settings.pipeline;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    let bus_pool = if settings.bus_shares_database() {
        pool.clone()
    } else {
        let bus_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&settings.bus_database_url)
            .await?;
        MIGRATOR.run(&bus_pool).await?;
        bus_pool
    };

    let clock: SharedClock = Arc::new(SystemClock);
    let store = Arc::new(PgAuctionStore::new(pool));
    let bus = Arc::new(PgBus::new(
        bus_pool,
        Topology::auction_search(),
        pipeline.delivery_lease,
    ));

    let shutdown_token = CancellationToken::new();
    shutdown::spawn_signal_listener(shutdown_token.clone());

    let mut workers = JoinSet::new();
    let relay = OutboxRelay::new(store.clone(), bus.clone(), clock.clone(), &pipeline);
    workers.spawn(relay.run(shutdown_token.clone()));

    let fault_router = Arc::new(FaultRouter::new(
        bus.clone(),
        Arc::new(TracingAlertSink),
        clock.clone(),
        pipeline.fault_escalation_window,
    ));
    for kind in EventKind::ALL {
        let consumer = QueueConsumer::new(
            QueueName::for_faults(SEARCH_SERVICE, AUCTION_SERVICE, kind),
            bus.clone(),
            bus.clone(),
            fault_router.clone(),
            RetryPolicy::from_config(&pipeline),
        )
        .with_concurrency(pipeline.queue_concurrency_limit)
        .with_clock(clock.clone());
        workers.spawn(consumer.run(shutdown_token.clone()));
    }

    let app = routes::auction_app(AuctionState::new(clock, store.clone(), store));
    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "Listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned())
        .await;

    shutdown_token.cancel();
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "background worker panicked");
        }
    }
    info!("Gavel auction service stopped");
    telemetry.shutdown();

    serve_result.map_err(AppError::from)
}
