mod auth;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use mobsync_core::catalog;
use mobsync_core::db::{Database, ReplicaConfig};
use mobsync_core::sync::ContractGrantResolver;
use mobsync_core::SyncEngine;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mobsync_api=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting mobsync-api with config: {:?}", config);

    let db = Arc::new(open_database(&config).await?);
    let registry = Arc::new(catalog::default_registry()?);
    registry.verify_schema(db.connection()).await?;
    tracing::info!(collections = registry.len(), "Collection registry ready");

    let scopes = Arc::new(ContractGrantResolver::new(
        db.clone(),
        config.scope_cache_ttl,
    ));
    let state = AppState::new(config.clone(), SyncEngine::new(db, registry), scopes);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("mobsync-api listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn open_database(config: &AppConfig) -> mobsync_core::Result<Database> {
    match &config.replica {
        Some(replica) => {
            tracing::info!(url = %replica.url, "Opening embedded replica");
            let replica_config = ReplicaConfig::new(&replica.url, &replica.auth_token)
                .with_sync_interval(replica.sync_interval);
            Database::open_replica(&config.database_path, replica_config).await
        }
        None => Database::open(&config.database_path).await,
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
