//! Conversions between domain values and PostgreSQL column values.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::DistrictId;

use super::db_error;

/// Postgres has no unsigned integers
pub(crate) fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StreetmetricsError::Serialization(format!("{} does not fit BIGINT", value)))
}

pub(crate) fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StreetmetricsError::Serialization(format!("negative value {} in row", value)))
}

pub(crate) fn district_key(id: DistrictId) -> Result<i64> {
    to_i64(id.0)
}

pub(crate) fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(|e| db_error("decode row", e))
}

/// Encode a geometry as a GeoJSON object
pub(crate) fn geometry_to_json(value: geojson::Value) -> Result<serde_json::Value> {
    to_json(&geojson::Geometry::new(value))
}

pub(crate) fn geometry_from_json<G>(json: serde_json::Value) -> Result<G>
where
    G: TryFrom<geojson::Value, Error = geojson::Error>,
{
    let geometry = geojson::Geometry::from_json_value(json)
        .map_err(|e| StreetmetricsError::Serialization(format!("Invalid GeoJSON: {}", e)))?;
    G::try_from(geometry.value)
        .map_err(|e| StreetmetricsError::Serialization(format!("Unexpected geometry: {}", e)))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StreetmetricsError::Serialization(e.to_string()))
}

pub(crate) fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StreetmetricsError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, LineString, MultiLineString};

    #[test]
    fn test_line_geojson_shape() {
        let line = line_string![(x: 1.0, y: 2.0), (x: 3.0, y: 4.0)];
        let json = geometry_to_json(geojson::Value::from(&line)).unwrap();
        assert_eq!(json["type"], "LineString");
        assert_eq!(json["coordinates"][1][0], 3.0);

        let decoded: LineString<f64> = geometry_from_json(json.clone()).unwrap();
        assert_eq!(decoded, line);

        let wrong: Result<MultiLineString<f64>> = geometry_from_json(json);
        assert!(wrong.is_err());
    }

    #[test]
    fn test_unsigned_bounds() {
        assert_eq!(to_i64(42).unwrap(), 42);
        assert!(to_i64(u64::MAX).is_err());
        assert!(to_u64(-1).is_err());
    }
}
