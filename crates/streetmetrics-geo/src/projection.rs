//! Planar approximations used for tolerance checks and lengths.

use geo::{BoundingRect, Coord, Distance, Haversine, LineString, Point};
use streetmetrics_core::models::Crs;

/// Mean meters per degree of latitude
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Sphere radius of EPSG:3857
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Ground meters per Web Mercator unit at northing `y`, i.e. cos(lat)
pub fn web_mercator_ground_scale(y: f64) -> f64 {
    1.0 / (y / WEB_MERCATOR_RADIUS).cosh()
}

/// Forward spherical Mercator of a lon/lat position in degrees
pub fn lon_lat_to_web_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.to_radians();
    Coord {
        x: WEB_MERCATOR_RADIUS * coord.x.to_radians(),
        y: WEB_MERCATOR_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

/// Local metric plane for tolerance checks.
///
/// Geographic coordinates use an equirectangular projection around a
/// reference latitude. Web Mercator coordinates are scaled by cos(lat) at a
/// reference northing. Both stay within a fraction of a percent across a
/// district-sized extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    scale_x: f64,
    scale_y: f64,
}

impl LocalProjection {
    /// Identity projection for coordinates already in meters
    pub fn identity() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0 }
    }

    /// Projection centered on `reference_lat` degrees
    pub fn geographic(reference_lat: f64) -> Self {
        let cos_lat = reference_lat.to_radians().cos().abs().max(1e-6);
        Self { scale_x: METERS_PER_DEGREE * cos_lat, scale_y: METERS_PER_DEGREE }
    }

    /// Web Mercator scaled to ground meters around northing `reference_y`
    pub fn web_mercator(reference_y: f64) -> Self {
        let scale = web_mercator_ground_scale(reference_y);
        Self { scale_x: scale, scale_y: scale }
    }

    /// Pick a projection for a set of lines in the given CRS
    pub fn for_lines<'a>(crs: &Crs, lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Self {
        if !crs.is_supported() {
            return Self::identity();
        }

        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for line in lines {
            if let Some(rect) = line.bounding_rect() {
                min_y = min_y.min(rect.min().y);
                max_y = max_y.max(rect.max().y);
            }
        }

        let reference = if min_y.is_finite() && max_y.is_finite() {
            (min_y + max_y) / 2.0
        } else {
            0.0
        };
        if crs.is_web_mercator() {
            Self::web_mercator(reference)
        } else {
            Self::geographic(reference)
        }
    }

    pub fn project_coord(&self, coord: Coord<f64>) -> Coord<f64> {
        Coord { x: coord.x * self.scale_x, y: coord.y * self.scale_y }
    }

    pub fn project(&self, line: &LineString<f64>) -> LineString<f64> {
        line.0.iter().map(|c| self.project_coord(*c)).collect()
    }
}

/// Length of a line in meters.
///
/// Geographic coordinates use the haversine distance between consecutive
/// vertices. Web Mercator edges are scaled by cos(lat) at their midpoint.
/// Other projected coordinates are taken as meters.
pub fn line_length_m(crs: &Crs, line: &LineString<f64>) -> f64 {
    if crs.is_geographic() {
        line.0
            .windows(2)
            .map(|pair| Haversine.distance(Point::from(pair[0]), Point::from(pair[1])))
            .sum()
    } else if crs.is_web_mercator() {
        line.0
            .windows(2)
            .map(|pair| {
                let planar = (pair[1].x - pair[0].x).hypot(pair[1].y - pair[0].y);
                planar * web_mercator_ground_scale((pair[0].y + pair[1].y) / 2.0)
            })
            .sum()
    } else {
        line.0
            .windows(2)
            .map(|pair| (pair[1].x - pair[0].x).hypot(pair[1].y - pair[0].y))
            .sum()
    }
}
