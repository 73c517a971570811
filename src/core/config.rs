//! Engine configuration knobs
//!
//! Collects the tunable parameters of the coordination engine in a single
//! options struct with sensible defaults.

use crate::core::geo::{LatLng, Point};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Number of worker threads for tile fetch/decode
    pub worker_threads: usize,
    /// Per-source retention cache capacity for tiles that scrolled out of view
    pub tile_cache_capacity: usize,
    /// Fixed zoom level at which annotations are bucketed into synthetic tiles
    pub annotation_zoom: u8,
    /// Symbol assigned to point annotations added without one
    pub default_point_symbol: String,
    /// Default transition duration pushed into the style cascade
    pub default_transition: Duration,
    /// Tile edge length in pixels used for viewport cover computations
    pub tile_size: u32,
    /// Zoom limits applied to the camera
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Initial camera position
    pub center: LatLng,
    pub zoom: f64,
    /// Initial viewport size in logical pixels and the device pixel ratio
    pub viewport_size: Point,
    pub pixel_ratio: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            tile_cache_capacity: 512,
            annotation_zoom: 14,
            default_point_symbol: "marker-red".to_string(),
            default_transition: Duration::ZERO,
            tile_size: 256,
            min_zoom: 0.0,
            max_zoom: 18.0,
            center: LatLng::default(),
            zoom: 0.0,
            viewport_size: Point::new(512.0, 512.0),
            pixel_ratio: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let options = EngineOptions::default();
        assert!(options.worker_threads >= 1);
        assert!(options.min_zoom < options.max_zoom);
        assert_eq!(options.default_point_symbol, "marker-red");
    }
}
