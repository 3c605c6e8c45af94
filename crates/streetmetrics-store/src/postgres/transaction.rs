use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use std::time::Duration;
use streetmetrics_core::error::{Result, StreetmetricsError};
use tokio::time::timeout;

use super::db_error;

/// Transaction wrapper that bounds commit and rollback time
pub struct Transaction<'a> {
    inner: Option<SqlxTransaction<'a, Postgres>>,
    timeout_duration: Duration,
}

impl<'a> Transaction<'a> {
    fn new(tx: SqlxTransaction<'a, Postgres>, timeout_duration: Duration) -> Self {
        Self { inner: Some(tx), timeout_duration }
    }

    /// Connection to run statements on inside the transaction
    pub fn conn(&mut self) -> Result<&mut sqlx::PgConnection> {
        self.inner
            .as_deref_mut()
            .ok_or_else(|| StreetmetricsError::compute("transaction", "already completed"))
    }

    /// Commit the transaction, making all changes permanent
    pub async fn commit(mut self) -> Result<()> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| StreetmetricsError::compute("transaction", "already completed"))?;

        match timeout(self.timeout_duration, tx.commit()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(db_error("commit transaction", e)),
            Err(_) => Err(StreetmetricsError::StoreUnavailable(format!(
                "transaction commit timeout after {}s",
                self.timeout_duration.as_secs()
            ))),
        }
    }

    /// Rollback the transaction, discarding all changes
    pub async fn rollback(mut self) -> Result<()> {
        let tx = self
            .inner
            .take()
            .ok_or_else(|| StreetmetricsError::compute("transaction", "already completed"))?;

        match timeout(self.timeout_duration, tx.rollback()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(db_error("rollback transaction", e)),
            Err(_) => Err(StreetmetricsError::StoreUnavailable(format!(
                "transaction rollback timeout after {}s",
                self.timeout_duration.as_secs()
            ))),
        }
    }
}

/// Begins transactions with a configured timeout
#[derive(Debug, Clone)]
pub struct TransactionManager {
    pool: PgPool,
    default_timeout: Duration,
}

impl TransactionManager {
    pub fn new(pool: PgPool, default_timeout: Duration) -> Self {
        Self { pool, default_timeout }
    }

    pub async fn begin(&self) -> Result<Transaction<'static>> {
        let tx = self.pool.begin().await.map_err(|e| db_error("begin transaction", e))?;
        Ok(Transaction::new(tx, self.default_timeout))
    }
}
