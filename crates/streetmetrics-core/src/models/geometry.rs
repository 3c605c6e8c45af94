//! Coordinate reference, unit and validity settings shared across crates.

use serde::{Deserialize, Serialize};

pub const METERS_PER_KILOMETER: f64 = 1000.0;
pub const METERS_PER_MILE: f64 = 1609.344;
pub const FEET_PER_METER: f64 = 1.0 / 0.3048;

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::new(3857, "Web Mercator")
    }

    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4326 => Self::wgs84(),
            3857 => Self::web_mercator(),
            other => Self::new(other, format!("EPSG:{}", other)),
        }
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, 4326 | 4269 | 4258 | 4674)
    }

    /// Spherical Mercator meters, whose scale grows by 1/cos(lat)
    pub fn is_web_mercator(&self) -> bool {
        matches!(self.epsg, 3857 | 3785 | 900913)
    }

    /// CRS whose coordinates the geometry code can measure on the ground
    pub fn is_supported(&self) -> bool {
        self.is_geographic() || self.is_web_mercator()
    }
}

/// Distance units for lengths reported by rollups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl DistanceUnit {
    /// Convert a distance value to meters
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * METERS_PER_KILOMETER,
            DistanceUnit::Miles => value * METERS_PER_MILE,
            DistanceUnit::Feet => value / FEET_PER_METER,
        }
    }

    /// Convert a distance value from meters to this unit
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Meters => meters,
            DistanceUnit::Kilometers => meters / METERS_PER_KILOMETER,
            DistanceUnit::Miles => meters / METERS_PER_MILE,
            DistanceUnit::Feet => meters * FEET_PER_METER,
        }
    }

    /// Convert between two units
    pub fn convert(value: f64, from: DistanceUnit, to: DistanceUnit) -> f64 {
        to.from_meters(from.to_meters(value))
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Feet => "ft",
        }
    }
}

/// Geometry validation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidityMode {
    /// Strict validation - a degenerate geometry fails the district
    Strict,
    /// Lenient validation - degenerate geometries are skipped and counted
    #[default]
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance_conversion() {
        assert!((DistanceUnit::Kilometers.to_meters(5.0) - 5000.0).abs() < 1e-9);
        assert!((DistanceUnit::Miles.from_meters(1609.344) - 1.0).abs() < 1e-12);
        assert!((DistanceUnit::Feet.to_meters(1.0) - 0.3048).abs() < 1e-12);
    }

    #[test]
    fn test_geographic_crs() {
        assert!(Crs::wgs84().is_geographic());
        assert!(!Crs::web_mercator().is_geographic());
        assert_eq!(Crs::from_epsg(32748).name, "EPSG:32748");
    }

    #[test]
    fn test_supported_crs() {
        assert!(Crs::wgs84().is_supported());
        assert!(Crs::web_mercator().is_web_mercator());
        assert!(Crs::web_mercator().is_supported());
        assert!(!Crs::from_epsg(32748).is_supported());
    }

    proptest! {
        #[test]
        fn prop_unit_round_trip(value in 0.0f64..1.0e9) {
            for (a, b) in [
                (DistanceUnit::Meters, DistanceUnit::Miles),
                (DistanceUnit::Kilometers, DistanceUnit::Miles),
                (DistanceUnit::Miles, DistanceUnit::Feet),
            ] {
                let there = DistanceUnit::convert(value, a, b);
                let back = DistanceUnit::convert(there, b, a);
                prop_assert!((back - value).abs() <= 1e-9 * value.max(1.0));
            }
        }
    }
}
