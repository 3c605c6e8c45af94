//! PostgreSQL storage adapter implementation
//!
//! Geometries are stored as GeoJSON in JSONB columns; each generation's rows
//! are keyed by `(district_id, generation)` and `district_generations` holds
//! the published pointer.

pub mod config;
mod codec;
mod districts;
mod generations;
mod refresh_log;
pub mod transaction;

pub use config::{ConfigError, PoolConfig, PostgresConfig};
pub use transaction::{Transaction, TransactionManager};

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::{postgres::PgPoolOptions, PgPool};
use streetmetrics_core::error::{Result, StreetmetricsError};

use crate::ports::RefreshStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Map a sqlx error, treating connectivity failures as infrastructure errors
pub(crate) fn db_error(action: &str, err: sqlx::Error) -> StreetmetricsError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            StreetmetricsError::StoreUnavailable(format!("Failed to {}: {}", action, err))
        }
        other => StreetmetricsError::compute(action, other.to_string()),
    }
}

/// PostgreSQL storage adapter
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    config: PostgresConfig,
    transactions: TransactionManager,
}

impl PostgresStore {
    /// Connect with the given configuration, running migrations if configured
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .idle_timeout(config.pool.idle_timeout)
            .max_lifetime(config.pool.max_lifetime)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                StreetmetricsError::StoreUnavailable(format!("Failed to connect to database: {}", e))
            })?;

        let transactions = TransactionManager::new(pool.clone(), config.transaction_timeout);
        let store = Self { pool, config, transactions };

        store.ping().await?;
        if store.config.auto_migrate {
            store.run_migrations().await?;
        }

        tracing::info!(
            max_connections = store.config.pool.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(store)
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StreetmetricsError::StoreUnavailable(format!("Migration failed: {}", e)))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            StreetmetricsError::StoreUnavailable(format!("Health check failed: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl RefreshStore for PostgresStore {
    async fn health_check(&self) -> Result<()> {
        self.ping().await
    }
}
