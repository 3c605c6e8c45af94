//! Slippy-map tile math for map consumers.

use geo::{coord, Rect};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::Crs;

use crate::projection::lon_lat_to_web_mercator;

/// Highest zoom level accepted
pub const MAX_ZOOM: u8 = 24;

/// A `z/x/y` tile address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self> {
        let tiles = 1u64 << z.min(MAX_ZOOM);
        if z > MAX_ZOOM || u64::from(x) >= tiles || u64::from(y) >= tiles {
            return Err(StreetmetricsError::InvalidTile { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Tile containing a lon/lat position
    pub fn containing(lon: f64, lat: f64, z: u8) -> Result<Self> {
        let n = 2f64.powi(i32::from(z));
        let max_index = n - 1.0;
        let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);
        let lat_rad = lat.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n)
            .floor()
            .clamp(0.0, max_index);
        Self::new(z, x as u32, y as u32)
    }

    pub fn bounds(&self) -> Rect<f64> {
        let n = 2f64.powi(i32::from(self.z));
        let min_lon = f64::from(self.x) / n * 360.0 - 180.0;
        let max_lon = f64::from(self.x + 1) / n * 360.0 - 180.0;
        // Tile rows grow southward
        let max_lat = world_y_to_lat(f64::from(self.y), n);
        let min_lat = world_y_to_lat(f64::from(self.y + 1), n);
        Rect::new(coord! { x: min_lon, y: min_lat }, coord! { x: max_lon, y: max_lat })
    }

    /// Tile bounds in the coordinates stored geometries use
    pub fn bounds_in(&self, crs: &Crs) -> Rect<f64> {
        let bounds = self.bounds();
        if crs.is_web_mercator() {
            Rect::new(lon_lat_to_web_mercator(bounds.min()), lon_lat_to_web_mercator(bounds.max()))
        } else {
            bounds
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = StreetmetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let invalid = || StreetmetricsError::ConfigInvalid {
            key: "tile".to_string(),
            reason: format!("expected z/x/y, got '{}'", s),
        };
        if parts.len() != 3 {
            return Err(invalid());
        }
        let z = parts[0].parse().map_err(|_| invalid())?;
        let x = parts[1].parse().map_err(|_| invalid())?;
        let y = parts[2].parse().map_err(|_| invalid())?;
        Self::new(z, x, y)
    }
}

fn world_y_to_lat(world_y: f64, n: f64) -> f64 {
    let lat_rad = (PI * (1.0 - 2.0 * world_y / n)).sinh().atan();
    lat_rad.to_degrees()
}

/// Lon/lat rectangle covered by tile `z/x/y`
pub fn tile_bounds(z: u8, x: u32, y: u32) -> Result<Rect<f64>> {
    Ok(TileCoord::new(z, x, y)?.bounds())
}
