//! GeoJSON file source for district boundaries and road features.

use async_trait::async_trait;
use geo::{BoundingRect, Intersects, LineString, MultiLineString, MultiPolygon, Polygon, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, JsonValue, Value};
use std::fs;
use std::path::Path;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{District, DistrictId, RoadClass, SourceSegment};
use streetmetrics_core::ports::SegmentSource;

const UNVERSIONED: &str = "unversioned";

struct RoadFeature {
    segment: SourceSegment,
    bounds: Option<Rect<f64>>,
}

/// Serves districts and roads parsed from two GeoJSON FeatureCollections.
///
/// District features carry `id`, `name`, `area_sq_km`, `active` and `version`
/// properties. Road features carry `class`, `subclass`, `name`, `length_m`
/// and `version`; MultiLineStrings are split into one segment per part.
pub struct GeoJsonSource {
    districts: Vec<District>,
    roads: Vec<RoadFeature>,
}

impl GeoJsonSource {
    pub fn load(districts_path: &Path, roads_path: &Path) -> Result<Self> {
        let districts = fs::read_to_string(districts_path)?;
        let roads = fs::read_to_string(roads_path)?;
        Self::parse(&districts, &roads)
    }

    pub fn parse(districts: &str, roads: &str) -> Result<Self> {
        let districts = read_collection(districts, "district")?
            .features
            .iter()
            .enumerate()
            .map(|(idx, feature)| district_from_feature(feature, idx))
            .collect::<Result<Vec<_>>>()?;

        let mut parsed = Vec::new();
        for (idx, feature) in read_collection(roads, "road")?.features.iter().enumerate() {
            parsed.extend(roads_from_feature(feature, idx));
        }

        tracing::info!(
            districts = districts.len(),
            roads = parsed.len(),
            "Loaded GeoJSON source"
        );
        Ok(Self { districts, roads: parsed })
    }
}

#[async_trait]
impl SegmentSource for GeoJsonSource {
    async fn list_districts(&self) -> Result<Vec<District>> {
        Ok(self.districts.clone())
    }

    async fn fetch_segments(&self, district: &District) -> Result<Vec<SourceSegment>> {
        let Some(extent) = district.boundary.as_ref().and_then(|b| b.bounding_rect()) else {
            return Ok(Vec::new());
        };

        Ok(self
            .roads
            .iter()
            .filter(|road| road.bounds.is_some_and(|b| b.intersects(&extent)))
            .map(|road| road.segment.clone())
            .collect())
    }
}

fn read_collection(content: &str, what: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = content.parse().map_err(|e| {
        StreetmetricsError::Upstream(format!("Failed to parse {} GeoJSON: {}", what, e))
    })?;

    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(StreetmetricsError::Upstream(format!(
            "{} GeoJSON must contain features, found a bare geometry",
            what
        ))),
    }
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn feature_key(feature: &Feature, idx: usize) -> String {
    string_property(feature, "id")
        .or_else(|| {
            feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            })
        })
        .unwrap_or_else(|| idx.to_string())
}

fn district_from_feature(feature: &Feature, idx: usize) -> Result<District> {
    let key = feature_key(feature, idx);
    let id = key.parse::<u64>().map(DistrictId).map_err(|_| {
        StreetmetricsError::Upstream(format!("District id '{}' is not a positive integer", key))
    })?;

    let boundary = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(value @ Value::Polygon(_)) => {
            Some(Polygon::<f64>::try_from(value.clone()).map(MultiPolygon::from))
        }
        Some(value @ Value::MultiPolygon(_)) => Some(MultiPolygon::<f64>::try_from(value.clone())),
        _ => None,
    }
    .transpose()
    .map_err(|e| StreetmetricsError::Upstream(format!("District {} boundary: {}", id, e)))?;

    let name = string_property(feature, "name").unwrap_or_else(|| format!("District {}", id));
    let version = string_property(feature, "version").unwrap_or_else(|| UNVERSIONED.into());
    let mut district =
        District::new(id, name, boundary.clone().unwrap_or(MultiPolygon(Vec::new())))
            .with_version(version);
    // Refresh rejects boundaryless districts individually
    district.boundary = boundary;

    district.area_sq_km = feature.property("area_sq_km").and_then(JsonValue::as_f64);
    if let Some(active) = feature.property("active").and_then(JsonValue::as_bool) {
        district.active = active;
    }
    Ok(district)
}

fn roads_from_feature(feature: &Feature, idx: usize) -> Vec<RoadFeature> {
    let key = feature_key(feature, idx);
    let Some(class) = string_property(feature, "class") else {
        tracing::warn!(feature = %key, "Skipping road feature without a class");
        return Vec::new();
    };

    let lines: Vec<LineString<f64>> = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(value @ Value::LineString(_)) => {
            LineString::try_from(value.clone()).map(|l| vec![l]).unwrap_or_default()
        }
        Some(value @ Value::MultiLineString(_)) => MultiLineString::try_from(value.clone())
            .map(|m| m.0)
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    if lines.is_empty() {
        tracing::warn!(feature = %key, "Skipping road feature without line geometry");
        return Vec::new();
    }

    let split = lines.len() > 1;
    let length_m =
        if split { None } else { feature.property("length_m").and_then(JsonValue::as_f64) };
    let version = string_property(feature, "version").unwrap_or_else(|| UNVERSIONED.into());

    lines
        .into_iter()
        .enumerate()
        .map(|(part, geometry)| RoadFeature {
            bounds: geometry.bounding_rect(),
            segment: SourceSegment {
                feature_id: if split { format!("{}/{}", key, part) } else { key.clone() },
                class: RoadClass::new(&class),
                subclass: string_property(feature, "subclass"),
                name: string_property(feature, "name"),
                geometry,
                length_m,
                source_version: version.clone(),
            },
        })
        .collect()
}
