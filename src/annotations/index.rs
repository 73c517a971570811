//! Spatially indexed store of user annotations
//!
//! Annotations are bucketed into the synthetic tile ids their bounding box
//! intersects at a fixed indexing zoom. The buckets are a coarse accelerator
//! only; queries filter candidates against the real bounding box. Identifiers
//! increase monotonically and are never reused, even after removal.
//!
//! The index itself never crosses threads. Edits return the set of tile ids
//! whose contents changed; the caller materializes those tiles and hands the
//! result to the render thread as an opaque invalidation list.

use crate::core::geo::{LatLng, LatLngBounds, TileCoord};
use crate::prelude::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    Point { symbol: String },
    Shape,
}

/// A user-added point or shape overlay. Geometry and bounds are immutable
/// after creation; shapes carry a closed ring of points.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub id: u32,
    pub kind: AnnotationKind,
    pub geometry: Vec<LatLng>,
    pub bounds: LatLngBounds,
}

/// One rendered feature inside a synthetic annotation tile. The relation back
/// to the owning annotation is the id alone; features are rebuilt whenever
/// their tile is regenerated and never extend annotation lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationFeature {
    pub id: u32,
    pub kind: AnnotationKind,
    pub geometry: Vec<LatLng>,
}

/// Materialized contents of one synthetic tile, handed to the render thread.
/// An empty feature list means the tile became empty and should be dropped.
#[derive(Debug, Clone)]
pub struct AnnotationTile {
    pub coord: TileCoord,
    pub features: Vec<AnnotationFeature>,
}

pub struct AnnotationIndex {
    annotations: HashMap<u32, Annotation>,
    buckets: HashMap<TileCoord, HashSet<u32>>,
    next_id: u32,
    indexing_zoom: u8,
    default_point_symbol: String,
}

impl AnnotationIndex {
    pub fn new(indexing_zoom: u8, default_point_symbol: impl Into<String>) -> Self {
        Self {
            annotations: HashMap::default(),
            buckets: HashMap::default(),
            next_id: 0,
            indexing_zoom: indexing_zoom.min(22),
            default_point_symbol: default_point_symbol.into(),
        }
    }

    pub fn set_default_point_symbol(&mut self, symbol: impl Into<String>) {
        self.default_point_symbol = symbol.into();
    }

    pub fn default_point_symbol(&self) -> &str {
        &self.default_point_symbol
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bucket_tiles(&self, bounds: &LatLngBounds) -> Vec<TileCoord> {
        TileCoord::intersecting(bounds, self.indexing_zoom)
    }

    fn insert(&mut self, kind: AnnotationKind, geometry: Vec<LatLng>) -> Option<(u32, Vec<TileCoord>)> {
        let bounds = LatLngBounds::from_points(&geometry)?;
        let id = self.allocate_id();
        let tiles = self.bucket_tiles(&bounds);
        for coord in &tiles {
            self.buckets.entry(*coord).or_default().insert(id);
        }
        self.annotations.insert(
            id,
            Annotation {
                id,
                kind,
                geometry,
                bounds,
            },
        );
        Some((id, tiles))
    }

    /// Adds point annotations. When `symbols` is shorter than `points`, the
    /// remaining points get the default symbol. Returns the set of changed
    /// tile ids and the new annotation ids, in input order.
    pub fn add_points(&mut self, points: &[LatLng], symbols: &[String]) -> (Vec<TileCoord>, Vec<u32>) {
        let mut changed = HashSet::default();
        let mut ids = Vec::with_capacity(points.len());
        for (i, point) in points.iter().enumerate() {
            let symbol = symbols
                .get(i)
                .cloned()
                .unwrap_or_else(|| self.default_point_symbol.clone());
            if let Some((id, tiles)) = self.insert(AnnotationKind::Point { symbol }, vec![*point]) {
                ids.push(id);
                changed.extend(tiles);
            }
        }
        (sorted(changed), ids)
    }

    /// Adds closed shapes, one per outer ring. Empty rings are skipped.
    pub fn add_shapes(&mut self, shapes: Vec<Vec<LatLng>>) -> (Vec<TileCoord>, Vec<u32>) {
        let mut changed = HashSet::default();
        let mut ids = Vec::with_capacity(shapes.len());
        for ring in shapes {
            match self.insert(AnnotationKind::Shape, ring) {
                Some((id, tiles)) => {
                    ids.push(id);
                    changed.extend(tiles);
                }
                None => log::warn!("skipping shape annotation with empty geometry"),
            }
        }
        (sorted(changed), ids)
    }

    /// Removes annotations by id; unknown ids are ignored. Returns the set of
    /// tile ids whose contents changed.
    pub fn remove(&mut self, ids: &[u32]) -> Vec<TileCoord> {
        let mut changed = HashSet::default();
        for id in ids {
            let Some(annotation) = self.annotations.remove(id) else {
                continue;
            };
            for coord in self.bucket_tiles(&annotation.bounds) {
                if let Some(bucket) = self.buckets.get_mut(&coord) {
                    bucket.remove(id);
                    if bucket.is_empty() {
                        self.buckets.remove(&coord);
                    }
                    changed.insert(coord);
                }
            }
        }
        sorted(changed)
    }

    /// Annotation ids whose bounding box intersects `bounds`. Consults only
    /// the intersecting buckets, then filters false positives precisely.
    pub fn query(&self, bounds: &LatLngBounds) -> Vec<u32> {
        let mut hits = HashSet::default();
        for coord in self.bucket_tiles(bounds) {
            let Some(bucket) = self.buckets.get(&coord) else {
                continue;
            };
            for id in bucket {
                if let Some(annotation) = self.annotations.get(id) {
                    if annotation.bounds.intersects(bounds) {
                        hits.insert(*id);
                    }
                }
            }
        }
        let mut out: Vec<u32> = hits.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Combined bounding box of the given annotations; `None` when no id is
    /// known.
    pub fn bounds_of(&self, ids: &[u32]) -> Option<LatLngBounds> {
        let mut combined: Option<LatLngBounds> = None;
        for id in ids {
            if let Some(annotation) = self.annotations.get(id) {
                combined = Some(match combined {
                    Some(bounds) => bounds.union(&annotation.bounds),
                    None => annotation.bounds,
                });
            }
        }
        combined
    }

    /// Materializes the features currently bucketed in `coord`
    pub fn materialize(&self, coord: TileCoord) -> AnnotationTile {
        let mut features: Vec<AnnotationFeature> = self
            .buckets
            .get(&coord)
            .into_iter()
            .flatten()
            .filter_map(|id| self.annotations.get(id))
            .map(|annotation| AnnotationFeature {
                id: annotation.id,
                kind: annotation.kind.clone(),
                geometry: annotation.geometry.clone(),
            })
            .collect();
        features.sort_by_key(|feature| feature.id);
        AnnotationTile { coord, features }
    }
}

fn sorted(tiles: HashSet<TileCoord>) -> Vec<TileCoord> {
    let mut out: Vec<TileCoord> = tiles.into_iter().collect();
    out.sort_unstable();
    out
}
