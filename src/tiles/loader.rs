//! Per-source tile loading
//!
//! Each enabled source owns one [`SourceLoader`]: it computes the tile set
//! the current view needs, submits missing tiles to the shared worker pool
//! and collects completions over a channel drained on the render thread.
//! Tiles that scroll out of view are retired into a small LRU so a reversed
//! pan does not refetch them.

use crate::background::WorkerPool;
use crate::annotations::AnnotationTile;
use crate::core::geo::TileCoord;
use crate::core::transform::TransformState;
use crate::engine::thread::EngineHandle;
use crate::engine::update::UpdateMask;
use crate::prelude::{HashMap, HashSet};
use crate::rendering::SourceSnapshot;
use crate::tiles::source::{SourceDescriptor, SourceKind, TileData};
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use lru::LruCache;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Shared blocking HTTP client with a custom User-Agent so that public tile
/// servers don't reject the request. Building the client once avoids the cost
/// of TLS and connection pool setup for every tile.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("mapcore/0.1 (+https://github.com/example/mapcore)")
        .build()
        .expect("failed to build reqwest blocking client")
});

/// Blocking tile fetch, run on a worker-pool thread
pub trait TileFetch: Send + Sync {
    fn fetch_tile(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches tiles over HTTP with a short retry
pub struct HttpTileFetch;

impl TileFetch for HttpTileFetch {
    fn fetch_tile(&self, url: &str) -> Result<Vec<u8>> {
        const MAX_ATTEMPTS: usize = 2;
        let mut last_err: Option<Box<dyn std::error::Error + Send + Sync>> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            log::debug!("fetch tile {url} attempt {attempt}");
            let result: Result<Vec<u8>> = (|| {
                let resp = HTTP_CLIENT.get(url).send()?;
                if !resp.status().is_success() {
                    return Err(format!("HTTP {}", resp.status()).into());
                }
                Ok(resp.bytes()?.to_vec())
            })();
            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    log::warn!("tile {url} download failed on attempt {attempt}: {e}");
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        std::thread::sleep(std::time::Duration::from_millis(100));
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| "tile download failed".into()))
    }
}

struct TileFetchResult {
    coord: TileCoord,
    generation: u64,
    data: Result<Vec<u8>>,
}

/// Loader for one enabled source. Mutated only on the render thread; worker
/// threads communicate exclusively through the results channel.
pub struct SourceLoader {
    descriptor: SourceDescriptor,
    /// Style generation this loader was created under; completions stamped
    /// with a different generation are discarded.
    generation: u64,
    ready: HashMap<TileCoord, Arc<TileData>>,
    pending: HashSet<TileCoord>,
    retired: LruCache<TileCoord, Arc<TileData>>,
    results_tx: Sender<TileFetchResult>,
    results_rx: Receiver<TileFetchResult>,
}

impl SourceLoader {
    pub(crate) fn new(descriptor: SourceDescriptor, generation: u64, cache_capacity: usize) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            descriptor,
            generation,
            ready: HashMap::default(),
            pending: HashSet::default(),
            retired: LruCache::new(NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN)),
            results_tx,
            results_rx,
        }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// One refresh pass for a real (vector/raster) source: drain completed
    /// downloads, recompute the needed tile set for the snapshot, revive or
    /// evict, and schedule what is missing. Returns whether the ready set
    /// changed.
    pub(crate) fn refresh(
        &mut self,
        snapshot: &TransformState,
        workers: &WorkerPool,
        fetch: &Arc<dyn TileFetch>,
        handle: &Arc<EngineHandle>,
    ) -> bool {
        let mut changed = self.drain_results();

        let needed: HashSet<TileCoord> = TileCoord::covering(
            &snapshot.center,
            snapshot.tile_zoom(),
            snapshot.size,
            self.descriptor.tile_size,
        )
        .into_iter()
        .collect();

        // Revive recently retired tiles instead of refetching them
        for coord in &needed {
            if !self.ready.contains_key(coord) {
                if let Some(data) = self.retired.pop(coord) {
                    self.ready.insert(*coord, data);
                    changed = true;
                }
            }
        }

        let evicted: Vec<TileCoord> = self
            .ready
            .keys()
            .filter(|coord| !needed.contains(coord))
            .copied()
            .collect();
        for coord in evicted {
            if let Some(data) = self.ready.remove(&coord) {
                self.retired.put(coord, data);
                changed = true;
            }
        }

        for coord in needed {
            if self.ready.contains_key(&coord) || self.pending.contains(&coord) {
                continue;
            }
            let Some(url) = self.descriptor.tile_url(coord) else {
                log::debug!("source {} has no tile URL template", self.descriptor.id);
                continue;
            };
            self.pending.insert(coord);
            let tx = self.results_tx.clone();
            let generation = self.generation;
            let fetch = fetch.clone();
            let handle = handle.clone();
            let job = Box::new(move || {
                let data = fetch.fetch_tile(&url);
                let _ = tx.send(TileFetchResult {
                    coord,
                    generation,
                    data,
                });
                handle.request_update(UpdateMask::NOTHING);
            });
            if let Err(e) = workers.execute(job) {
                self.pending.remove(&coord);
                log::warn!("could not queue tile {coord:?}: {e}");
            }
        }

        changed
    }

    fn drain_results(&mut self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.results_rx.try_recv() {
            self.pending.remove(&result.coord);
            if result.generation != self.generation {
                log::debug!(
                    "discarding stale tile {:?} for source {}",
                    result.coord,
                    self.descriptor.id
                );
                continue;
            }
            match result.data {
                Ok(bytes) => {
                    log::debug!(
                        "tile {:?} ready for source {} ({} bytes)",
                        result.coord,
                        self.descriptor.id,
                        bytes.len()
                    );
                    let data = match self.descriptor.kind {
                        SourceKind::Raster => TileData::Raster(bytes),
                        SourceKind::Vector => TileData::Vector(bytes),
                        // The synthetic source never fetches
                        SourceKind::Annotations => continue,
                    };
                    self.ready.insert(result.coord, Arc::new(data));
                    changed = true;
                }
                Err(e) => log::warn!(
                    "tile {:?} load failed for source {}: {e}",
                    result.coord,
                    self.descriptor.id
                ),
            }
        }
        changed
    }

    /// Refresh pass for the synthetic annotation source: the live tiles are
    /// whatever materialized tiles intersect the viewport. `dirty` is set
    /// when the store changed since the last pass.
    pub(crate) fn refresh_annotations(
        &mut self,
        snapshot: &TransformState,
        store: &HashMap<TileCoord, AnnotationTile>,
        dirty: bool,
    ) -> bool {
        let visible = snapshot.visible_bounds();
        let mut next: HashMap<TileCoord, Arc<TileData>> = HashMap::default();
        for (coord, tile) in store {
            if coord.bounds().intersects(&visible) {
                next.insert(*coord, Arc::new(TileData::Annotations(tile.features.clone())));
            }
        }
        let changed = dirty
            || next.len() != self.ready.len()
            || next.keys().any(|coord| !self.ready.contains_key(coord));
        self.ready = next;
        changed
    }

    /// Ready tiles captured for one frame, in stable order
    pub fn snapshot(&self) -> SourceSnapshot {
        let mut tiles: Vec<(TileCoord, Arc<TileData>)> = self
            .ready
            .iter()
            .map(|(coord, data)| (*coord, data.clone()))
            .collect();
        tiles.sort_by_key(|(coord, _)| *coord);
        SourceSnapshot {
            id: self.descriptor.id.clone(),
            kind: self.descriptor.kind,
            tiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineOptions;
    use crate::core::geo::LatLng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFetch(AtomicUsize);

    impl TileFetch for CountingFetch {
        fn fetch_tile(&self, _url: &str) -> Result<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1, 2, 3])
        }
    }

    fn snapshot() -> TransformState {
        crate::core::transform::Transform::new(&EngineOptions {
            center: LatLng::new(40.0, -74.0),
            zoom: 4.0,
            ..Default::default()
        })
        .snapshot()
    }

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor {
            id: "osm".to_string(),
            kind: SourceKind::Raster,
            url_template: Some("https://tile.example.org/{z}/{x}/{y}.png".to_string()),
            tile_size: 256,
        }
    }

    fn settle(loader: &mut SourceLoader, snapshot: &TransformState, workers: &WorkerPool, fetch: &Arc<dyn TileFetch>, handle: &Arc<EngineHandle>) {
        for _ in 0..100 {
            loader.refresh(snapshot, workers, fetch, handle);
            if loader.pending_count() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("tile loads never settled");
    }

    #[test]
    fn test_refresh_loads_needed_tiles() {
        let workers = WorkerPool::new(2, "test-worker");
        let fetch: Arc<dyn TileFetch> = Arc::new(CountingFetch(AtomicUsize::new(0)));
        let handle = Arc::new(EngineHandle::new());
        let mut loader = SourceLoader::new(descriptor(), 1, 16);
        let snapshot = snapshot();

        loader.refresh(&snapshot, &workers, &fetch, &handle);
        assert!(loader.pending_count() > 0);
        settle(&mut loader, &snapshot, &workers, &fetch, &handle);
        assert!(loader.ready_count() > 0);
    }

    #[test]
    fn test_stale_generation_results_are_discarded() {
        // The loader was rebuilt under generation 2 while a download from
        // generation 1 was still in flight and reused the same descriptor
        let mut loader = SourceLoader::new(descriptor(), 2, 16);
        let coord = TileCoord::new(1, 1, 4);

        loader.pending.insert(coord);
        loader
            .results_tx
            .send(TileFetchResult {
                coord,
                generation: 1,
                data: Ok(vec![1]),
            })
            .unwrap();
        assert!(!loader.drain_results());
        assert_eq!(loader.ready_count(), 0);
        assert_eq!(loader.pending_count(), 0);

        loader.pending.insert(coord);
        loader
            .results_tx
            .send(TileFetchResult {
                coord,
                generation: 2,
                data: Ok(vec![1]),
            })
            .unwrap();
        assert!(loader.drain_results());
        assert_eq!(loader.ready_count(), 1);
    }

    #[test]
    fn test_evicted_tiles_are_revived_from_the_retired_cache() {
        let workers = WorkerPool::new(2, "test-worker");
        let counting = Arc::new(CountingFetch(AtomicUsize::new(0)));
        let fetch: Arc<dyn TileFetch> = counting.clone();
        let handle = Arc::new(EngineHandle::new());
        let mut loader = SourceLoader::new(descriptor(), 1, 64);

        let near = snapshot();
        settle(&mut loader, &near, &workers, &fetch, &handle);
        let fetched = counting.0.load(Ordering::SeqCst);

        // Pan away and back; the second visit must come from the cache
        let far = crate::core::transform::Transform::new(&EngineOptions {
            center: LatLng::new(-30.0, 100.0),
            zoom: 4.0,
            ..Default::default()
        })
        .snapshot();
        settle(&mut loader, &far, &workers, &fetch, &handle);
        settle(&mut loader, &near, &workers, &fetch, &handle);
        let refetched_near = counting.0.load(Ordering::SeqCst);

        let far_tiles = TileCoord::covering(&far.center, far.tile_zoom(), far.size, 256).len();
        assert_eq!(refetched_near, fetched + far_tiles);
    }

    #[test]
    fn test_annotation_refresh_tracks_store_and_viewport() {
        let mut loader = SourceLoader::new(SourceDescriptor::annotations("annotations"), 1, 16);
        let snapshot = snapshot();
        let mut store: HashMap<TileCoord, AnnotationTile> = HashMap::default();

        let visible_tile = TileCoord::from_lat_lng(&snapshot.center, 14);
        store.insert(
            visible_tile,
            AnnotationTile {
                coord: visible_tile,
                features: Vec::new(),
            },
        );
        // A tile on the other side of the world never becomes ready
        let hidden_tile = TileCoord::from_lat_lng(&LatLng::new(-40.0, 120.0), 14);
        store.insert(
            hidden_tile,
            AnnotationTile {
                coord: hidden_tile,
                features: Vec::new(),
            },
        );

        assert!(loader.refresh_annotations(&snapshot, &store, true));
        assert_eq!(loader.ready_count(), 1);
        // Unchanged store, unchanged viewport: no repaint needed
        assert!(!loader.refresh_annotations(&snapshot, &store, false));
    }
}
