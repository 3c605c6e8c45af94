use async_trait::async_trait;
use geo::MultiPolygon;
use sqlx::postgres::PgRow;
use streetmetrics_core::error::Result;
use streetmetrics_core::models::{District, DistrictId};

use super::codec::{district_key, geometry_from_json, geometry_to_json, get, to_u64};
use super::{db_error, PostgresStore};
use crate::ports::DistrictStore;

const DISTRICT_COLUMNS: &str =
    "id, name, boundary, area_sq_km, active, source_version, updated_at";

fn district_from_row(row: &PgRow) -> Result<District> {
    let boundary: Option<serde_json::Value> = get(row, "boundary")?;
    let boundary = boundary.map(geometry_from_json::<MultiPolygon<f64>>).transpose()?;

    Ok(District {
        id: DistrictId(to_u64(get(row, "id")?)?),
        name: get(row, "name")?,
        boundary,
        area_sq_km: get(row, "area_sq_km")?,
        active: get(row, "active")?,
        source_version: get(row, "source_version")?,
        updated_at: get(row, "updated_at")?,
    })
}

#[async_trait]
impl DistrictStore for PostgresStore {
    async fn upsert_district(&self, district: &District) -> Result<()> {
        let boundary = district
            .boundary
            .as_ref()
            .map(|b| geometry_to_json(geojson::Value::from(b)))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO districts (id, name, boundary, area_sq_km, active, source_version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                boundary = EXCLUDED.boundary,
                area_sq_km = EXCLUDED.area_sq_km,
                active = EXCLUDED.active,
                source_version = EXCLUDED.source_version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(district_key(district.id)?)
        .bind(&district.name)
        .bind(boundary)
        .bind(district.area_sq_km)
        .bind(district.active)
        .bind(&district.source_version)
        .bind(district.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("store district", e))?;

        Ok(())
    }

    async fn get_district(&self, id: DistrictId) -> Result<Option<District>> {
        let row = sqlx::query(&format!("SELECT {} FROM districts WHERE id = $1", DISTRICT_COLUMNS))
            .bind(district_key(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get district", e))?;

        row.as_ref().map(district_from_row).transpose()
    }

    async fn list_districts(&self) -> Result<Vec<District>> {
        let rows = sqlx::query(&format!("SELECT {} FROM districts ORDER BY id", DISTRICT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list districts", e))?;

        rows.iter().map(district_from_row).collect()
    }

    async fn list_active_districts(&self) -> Result<Vec<District>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM districts WHERE active ORDER BY id",
            DISTRICT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list active districts", e))?;

        rows.iter().map(district_from_row).collect()
    }
}
