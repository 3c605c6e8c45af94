//! PostgreSQL configuration

use std::time::Duration;
use streetmetrics_core::error::StreetmetricsError;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl From<ConfigError> for StreetmetricsError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing(key) => StreetmetricsError::ConfigMissing { key },
            ConfigError::Invalid { key, reason } => StreetmetricsError::ConfigInvalid { key, reason },
        }
    }
}

/// PostgreSQL connection and behavior configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Connection pool configuration
    pub pool: PoolConfig,
    /// Run pending migrations when the store connects
    pub auto_migrate: bool,
    /// Upper bound for committing or rolling back one transaction
    pub transaction_timeout: Duration,
}

impl PostgresConfig {
    /// Load configuration from environment variables
    ///
    /// Requires DATABASE_URL. `STREETMETRICS_DB_MAX_CONNECTIONS`,
    /// `STREETMETRICS_DB_MIN_CONNECTIONS` and `STREETMETRICS_DB_AUTO_MIGRATE`
    /// are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?;

        let mut config = Self::new(database_url).map_err(|_| ConfigError::Invalid {
            key: "DATABASE_URL".to_string(),
            reason: "cannot be empty".to_string(),
        })?;

        if let Some(max) = env_number("STREETMETRICS_DB_MAX_CONNECTIONS")? {
            config.pool.max_connections = max;
        }
        if let Some(min) = env_number("STREETMETRICS_DB_MIN_CONNECTIONS")? {
            config.pool.min_connections = min;
        }
        if let Ok(value) = std::env::var("STREETMETRICS_DB_AUTO_MIGRATE") {
            config.auto_migrate = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Create a new configuration with the given database URL
    pub fn new(database_url: String) -> Result<Self, ConfigError> {
        if database_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "database_url".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        Ok(Self {
            database_url,
            pool: PoolConfig::default(),
            auto_migrate: true,
            transaction_timeout: Duration::from_secs(30),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "database_url".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        self.pool.validate()?;

        Ok(())
    }
}

fn env_number(key: &str) -> Result<Option<u32>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("'{}' is not a number", value),
        }),
        Err(_) => Ok(None),
    }
}

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Maximum number of connections allowed
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,
    /// Timeout for idle connections before they are closed
    pub idle_timeout: Duration,
    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_connections > self.max_connections {
            return Err(ConfigError::Invalid {
                key: "pool.min_connections".to_string(),
                reason: format!(
                    "min_connections ({}) cannot be greater than max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "pool.max_connections".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
