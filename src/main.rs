use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use bearer_auth::auth::{RefreshTokenManager, SigningContext};
use bearer_auth::configuration::{get_configuration, Settings, StorageBackend};
use bearer_auth::startup::run;
use bearer_auth::store::{InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore};
use bearer_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    tracing::info!(jwt = ?configuration.jwt, "Configuration loaded successfully");

    let context = SigningContext::shared(&configuration.jwt).map_err(|e| {
        tracing::error!("Failed to build signing context: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Signing key not configured")
    })?;

    let store = build_store(&configuration).await?;
    let manager = RefreshTokenManager::new(context, store);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, manager)?.await
}

async fn build_store(configuration: &Settings) -> std::io::Result<Arc<dyn RefreshTokenStore>> {
    match configuration.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory refresh token store");
            Ok(Arc::new(InMemoryRefreshTokenStore::new()))
        }
        StorageBackend::Postgres => {
            let database = configuration.storage.database.as_ref().ok_or_else(|| {
                tracing::error!("storage.backend is postgres but storage.database is missing");
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "Database not configured")
            })?;

            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            let store = PgRefreshTokenStore::new(pool);
            store.migrate().await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
            })?;

            tracing::info!("Using PostgreSQL refresh token store");
            Ok(Arc::new(store))
        }
    }
}
