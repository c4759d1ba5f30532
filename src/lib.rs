pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::clock::SystemClock;
use crate::core::config::{Settings, StoreBackend};
use crate::core::{state::AppState, telemetry};
use crate::repositories::{memory::MemoryStore, postgres::PgStore, Store};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let store = open_store(&settings).await?;
    let state = AppState::new(settings, store, Arc::new(SystemClock));

    if let Err(err) = core::bootstrap::ensure_admin(&state).await {
        tracing::error!(error = %err, "Failed to ensure default admin");
    }
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        addr = %state.settings().server_addr(),
        store = state.store().backend_name(),
        environment = %state.settings().runtime().environment.as_str(),
        "Examdesk API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn Store>> {
    match settings.database().backend {
        StoreBackend::Postgres => {
            let db_pool = db::init_pool(settings).await?;
            db::run_migrations(&db_pool).await?;
            Ok(Arc::new(PgStore::new(db_pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
