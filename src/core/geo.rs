use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latitude limit of the Web Mercator projection
const MAX_LATITUDE: f64 = 85.0511287798;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Projects to world pixel coordinates at the given zoom level
    /// (origin at the north-west corner of the world, 256px base tile)
    pub fn to_world_pixel(&self, zoom: f64) -> Point {
        let scale = 256.0 * 2_f64.powf(zoom);
        let lat_rad = Self::clamp_lat(self.lat).to_radians();
        let x = (self.lng + 180.0) / 360.0 * scale;
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * scale;
        Point::new(x, y)
    }

    /// Reconstructs a LatLng from world pixel coordinates at the given zoom
    pub fn from_world_pixel(point: Point, zoom: f64) -> Self {
        let scale = 256.0 * 2_f64.powf(zoom);
        let lng = point.x / scale * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * point.y / scale);
        let lat = n.sinh().atan().to_degrees();
        Self::new(lat, lng)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Creates degenerate bounds around a single point
    pub fn from_point(point: LatLng) -> Self {
        Self::new(point, point)
    }

    /// Computes the bounds of a sequence of points; `None` when empty
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self::from_point(*first);
        for point in &points[1..] {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Checks if the bounds intersect with another bounds
    pub fn intersects(&self, other: &LatLngBounds) -> bool {
        !(other.north_east.lat < self.south_west.lat
            || other.south_west.lat > self.north_east.lat
            || other.north_east.lng < self.south_west.lng
            || other.south_west.lng > self.north_east.lng)
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Returns the union of this bounds with another bounds
    pub fn union(&self, other: &LatLngBounds) -> LatLngBounds {
        let south = self.south_west.lat.min(other.south_west.lat);
        let west = self.south_west.lng.min(other.south_west.lng);
        let north = self.north_east.lat.max(other.north_east.lat);
        let east = self.north_east.lng.max(other.north_east.lng);

        LatLngBounds::new(LatLng::new(south, west), LatLng::new(north, east))
    }
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Creates a tile coordinate from a LatLng and zoom level
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();
        let n = 2_f64.powi(zoom as i32);

        let x = ((lat_lng.lng + 180.0) / 360.0 * n).floor() as u32;
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as u32;
        let max = (n as u32).saturating_sub(1);

        Self::new(x.min(max), y.min(max), zoom)
    }

    /// Converts tile coordinate to LatLng (northwest corner)
    pub fn to_lat_lng(&self) -> LatLng {
        let n = 2_f64.powi(self.z as i32);
        let lng = self.x as f64 / n * 360.0 - 180.0;
        let lat_rad = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan();

        LatLng::new(lat_rad.to_degrees(), lng)
    }

    /// Gets the geographical bounds of the tile
    pub fn bounds(&self) -> LatLngBounds {
        let nw = self.to_lat_lng();
        let se = TileCoord::new(self.x + 1, self.y + 1, self.z).to_lat_lng();

        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        let max_coord = 2_u32.pow(self.z as u32);
        self.x < max_coord && self.y < max_coord
    }

    /// Computes the set of tiles covering a viewport of `size` pixels
    /// centered on `center` at the given integer zoom level.
    pub fn covering(center: &LatLng, zoom: u8, size: Point, tile_size: u32) -> Vec<TileCoord> {
        let n = 2_u32.pow(zoom as u32);
        let center_tile = TileCoord::from_lat_lng(center, zoom);
        let half_x = (size.x / (2.0 * tile_size as f64)).ceil() as i64 + 1;
        let half_y = (size.y / (2.0 * tile_size as f64)).ceil() as i64 + 1;

        let mut tiles = Vec::new();
        for dy in -half_y..=half_y {
            let y = center_tile.y as i64 + dy;
            if y < 0 || y >= n as i64 {
                continue;
            }
            for dx in -half_x..=half_x {
                // Longitude wraps around the antimeridian
                let x = (center_tile.x as i64 + dx).rem_euclid(n as i64);
                tiles.push(TileCoord::new(x as u32, y as u32, zoom));
            }
        }
        tiles.sort_unstable();
        tiles.dedup();
        tiles
    }

    /// Tiles at the given zoom whose area intersects `bounds`
    pub fn intersecting(bounds: &LatLngBounds, zoom: u8) -> Vec<TileCoord> {
        let top_left = TileCoord::from_lat_lng(
            &LatLng::new(bounds.north_east.lat, bounds.south_west.lng),
            zoom,
        );
        let bottom_right = TileCoord::from_lat_lng(
            &LatLng::new(bounds.south_west.lat, bounds.north_east.lng),
            zoom,
        );

        let mut tiles = Vec::new();
        for y in top_left.y..=bottom_right.y {
            for x in top_left.x..=bottom_right.x {
                tiles.push(TileCoord::new(x, y, zoom));
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_validity() {
        assert!(LatLng::new(45.0, 90.0).is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 181.0).is_valid());
    }

    #[test]
    fn test_world_pixel_roundtrip() {
        let original = LatLng::new(37.7749, -122.4194);
        let pixel = original.to_world_pixel(12.0);
        let restored = LatLng::from_world_pixel(pixel, 12.0);
        assert!((original.lat - restored.lat).abs() < 1e-9);
        assert!((original.lng - restored.lng).abs() < 1e-9);
    }

    #[test]
    fn test_tile_from_lat_lng() {
        // Zoom 0 has a single tile containing everything
        let tile = TileCoord::from_lat_lng(&LatLng::new(51.5, -0.1), 0);
        assert_eq!(tile, TileCoord::new(0, 0, 0));

        // Greenwich at zoom 1 falls into the eastern hemisphere tile
        let tile = TileCoord::from_lat_lng(&LatLng::new(51.5, 0.1), 1);
        assert_eq!((tile.x, tile.z), (1, 1));
    }

    #[test]
    fn test_tile_bounds_contains_origin_point() {
        let point = LatLng::new(37.7749, -122.4194);
        let tile = TileCoord::from_lat_lng(&point, 14);
        assert!(tile.bounds().contains(&point));
    }

    #[test]
    fn test_covering_includes_center_tile() {
        let center = LatLng::new(40.0, -74.0);
        let tiles = TileCoord::covering(&center, 10, Point::new(800.0, 600.0), 256);
        assert!(tiles.contains(&TileCoord::from_lat_lng(&center, 10)));
        assert!(tiles.iter().all(|t| t.is_valid()));
    }

    #[test]
    fn test_intersecting_covers_corner_tiles() {
        let bounds = LatLngBounds::from_coords(37.0, -123.0, 38.0, -122.0);
        let tiles = TileCoord::intersecting(&bounds, 8);
        assert!(tiles.contains(&TileCoord::from_lat_lng(&LatLng::new(38.0, -123.0), 8)));
        assert!(tiles.contains(&TileCoord::from_lat_lng(&LatLng::new(37.0, -122.0), 8)));
    }

    #[test]
    fn test_bounds_intersects() {
        let a = LatLngBounds::from_coords(0.0, 0.0, 10.0, 10.0);
        let b = LatLngBounds::from_coords(5.0, 5.0, 15.0, 15.0);
        let c = LatLngBounds::from_coords(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
