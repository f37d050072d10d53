use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use stockline_api::{app, AppState};
use stockline_core::{BatchLedger, FulfillmentService, FulfillmentStore, MemoryStore};
use stockline_store::{Config, DbClient, PgBatchLedger, PgFulfillmentStore, StorageBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockline_api=debug,stockline_core=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Stockline API on port {}", config.server.port);

    let (ledger, store): (Arc<dyn BatchLedger>, Arc<dyn FulfillmentStore>) = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let ledger: Arc<dyn BatchLedger> = Arc::new(PgBatchLedger::new(db.pool.clone()));
            let store: Arc<dyn FulfillmentStore> = Arc::new(PgFulfillmentStore::new(db.pool.clone()));
            (ledger, store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory demo store; nothing will be persisted");
            let memory = Arc::new(MemoryStore::demo());
            let ledger: Arc<dyn BatchLedger> = memory.clone();
            (ledger, memory as Arc<dyn FulfillmentStore>)
        }
    };

    let service = FulfillmentService::new(ledger, store, config.fulfillment.clone());
    let app = app(AppState::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
