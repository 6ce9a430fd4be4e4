//! Gavel search service entry point.
//!
//! Serves searches, applies auction events from the bus and backfills the
//! projection from the auction service once at startup.

use std::sync::Arc;
use std::time::Duration;

use gavel_api::error::AppError;
use gavel_api::routes;
use gavel_api::settings::ServiceSettings;
use gavel_api::shutdown;
use gavel_api::state::SearchState;
use gavel_api::telemetry;
use gavel_bus::consumer::{QueueConsumer, RetryPolicy};
use gavel_bus::postgres::PgBus;
use gavel_bus::topology::{AUCTION_SERVICE, QueueName, SEARCH_SERVICE, Topology};
use gavel_core::clock::{SharedClock, SystemClock};
use gavel_core::error::ReconcileError;
use gavel_core::event::EventKind;
use gavel_search::application::dispatcher::Dispatcher;
use gavel_search::application::reconciler::{ReconcileOutcome, Reconciler};
use gavel_search::infrastructure::auction_client::AuctionServiceClient;
use gavel_store::PgSearchStore;
use gavel_store::schema::MIGRATOR;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_PORT: u16 = 7002;
const AUCTION_SERVICE_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let telemetry = telemetry::init("gavel-search")?;
    info!("Starting Gavel search service");

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

    let auction_service =
        AuctionServiceClient::new(&settings.auction_service_url, AUCTION_SERVICE_TIMEOUT)
            .map_err(|e| AppError::Config(e.to_string()))?;

    let clock: SharedClock = Arc::new(SystemClock);
    let store = Arc::new(PgSearchStore::new(pool));
    let bus = Arc::new(PgBus::new(
        bus_pool,
        Topology::auction_search(),
        pipeline.delivery_lease,
    ));

    let shutdown_token = CancellationToken::new();
    shutdown::spawn_signal_listener(shutdown_token.clone());

    let mut workers = JoinSet::new();

    let reconciler = Reconciler::new(
        store.clone(),
        Arc::new(auction_service),
        pipeline.reconcile_backoff,
    );
    let reconcile_token = shutdown_token.clone();
    workers.spawn(async move {
        match reconciler.run(&reconcile_token).await {
            Ok(ReconcileOutcome::Completed(report)) => {
                info!(loaded = report.loaded, attempts = report.attempts, "projection backfilled");
            }
            Ok(ReconcileOutcome::AlreadyStarted) => {}
            Err(ReconcileError::Cancelled) => warn!("reconciliation cancelled by shutdown"),
            Err(e) => error!(error = %e, "reconciliation failed"),
        }
    });

    let dispatcher = Arc::new(Dispatcher::new(store.clone()));
    for kind in EventKind::ALL {
        let consumer = QueueConsumer::new(
            QueueName::for_events(AUCTION_SERVICE, SEARCH_SERVICE, kind),
            bus.clone(),
            bus.clone(),
            dispatcher.clone(),
            RetryPolicy::from_config(&pipeline),
        )
        .with_concurrency(pipeline.queue_concurrency_limit)
        .with_clock(clock.clone());
        workers.spawn(consumer.run(shutdown_token.clone()));
    }

    let app = routes::search_app(SearchState::new(clock, store));
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
    info!("Gavel search service stopped");
    telemetry.shutdown();

    serve_result.map_err(AppError::from)
}
