//! Marquee server — application entry point.

mod config;

use marquee_booking::AllocationService;
use marquee_db::repository::{SurrealShowRepository, SurrealTicketOfferRepository};
use marquee_db::{DbError, DbManager, run_migrations};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database: {0}")]
    Database(#[from] DbError),

    #[error("log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("marquee=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting Marquee server...");

    let config = ServerConfig::from_env()?;

    let manager = DbManager::connect(&config.db)
        .await
        .map_err(DbError::from)?;
    run_migrations(manager.client()).await?;

    let db = manager.client().clone();
    let lock_timeout = config.booking.lock_timeout();
    let allocations = AllocationService::new(
        SurrealShowRepository::new(db.clone()).with_lock_timeout(lock_timeout),
        SurrealTicketOfferRepository::new(db).with_lock_timeout(lock_timeout),
        config.booking.clone(),
    );

    tracing::info!(
        lock_timeout_ms = config.booking.lock_timeout_ms,
        response_grace_ms = config.booking.response_grace_ms,
        max_conflict_attempts = config.booking.max_conflict_attempts,
        "Allocation service ready"
    );

    tokio::signal::ctrl_c().await?;

    // The service and its connection stay up until shutdown is requested.
    drop(allocations);
    drop(manager);

    tracing::info!("Marquee server stopped.");
    Ok(())
}
