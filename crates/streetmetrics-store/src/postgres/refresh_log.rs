use async_trait::async_trait;
use sqlx::postgres::PgRow;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{DistrictId, RefreshLogEntry, RefreshOperation};

use super::codec::{district_key, get, to_i64, to_u64};
use super::{db_error, PostgresStore};
use crate::ports::RefreshLogStore;

const LOG_COLUMNS: &str = "id, run_id, district_id, operation, records_processed, duration_ms, \
     success, error, source_version, logged_at";

fn entry_from_row(row: &PgRow) -> Result<RefreshLogEntry> {
    let operation: String = get(row, "operation")?;
    let operation = RefreshOperation::parse(&operation).ok_or_else(|| {
        StreetmetricsError::Serialization(format!("Unknown refresh operation '{}'", operation))
    })?;
    let district_id: Option<i64> = get(row, "district_id")?;

    Ok(RefreshLogEntry {
        id: to_u64(get(row, "id")?)?,
        run_id: get(row, "run_id")?,
        district_id: district_id.map(|id| to_u64(id).map(DistrictId)).transpose()?,
        operation,
        records_processed: get(row, "records_processed")?,
        duration_ms: to_u64(get(row, "duration_ms")?)?,
        success: get(row, "success")?,
        error: get(row, "error")?,
        source_version: get(row, "source_version")?,
        logged_at: get(row, "logged_at")?,
    })
}

#[async_trait]
impl RefreshLogStore for PostgresStore {
    async fn append_log(&self, entry: &RefreshLogEntry) -> Result<u64> {
        let district_id = entry.district_id.map(district_key).transpose()?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO refresh_log (run_id, district_id, operation, records_processed,
                duration_ms, success, error, source_version, logged_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(entry.run_id)
        .bind(district_id)
        .bind(entry.operation.as_str())
        .bind(entry.records_processed)
        .bind(to_i64(entry.duration_ms)?)
        .bind(entry.success)
        .bind(&entry.error)
        .bind(&entry.source_version)
        .bind(entry.logged_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match db_error("append refresh log", e) {
            err @ StreetmetricsError::StoreUnavailable(_) => err,
            other => StreetmetricsError::LogWrite(other.to_string()),
        })?;

        to_u64(id)
    }

    async fn refresh_log(&self, district_id: Option<DistrictId>) -> Result<Vec<RefreshLogEntry>> {
        let rows = match district_id {
            Some(id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM refresh_log WHERE district_id = $1 ORDER BY id",
                    LOG_COLUMNS
                ))
                .bind(district_key(id)?)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM refresh_log ORDER BY id", LOG_COLUMNS))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| db_error("read refresh log", e))?;

        rows.iter().map(entry_from_row).collect()
    }
}
