//! The per-cycle update coordinator
//!
//! Runs on the render thread (or inline on the caller in static mode). Each
//! cycle atomically drains the pending update mask and applies the reasons in
//! a fixed order: style reload first (cascade and source discovery need a
//! style object), then debug/cascade pushes, then the unconditional camera
//! step and transform snapshot, then source reconciliation and tile refresh.
//! Asynchronous completions (style fetches, tile downloads, annotation
//! hand-offs) arrive over channels or shared queues and are folded into the
//! cycle that drains them.

use crate::annotations::AnnotationTile;
use crate::background::WorkerPool;
use crate::core::config::EngineOptions;
use crate::core::geo::TileCoord;
use crate::core::state::SharedMapState;
use crate::core::transform::TransformState;
use crate::engine::thread::EngineHandle;
use crate::engine::update::UpdateMask;
use crate::prelude::HashMap;
use crate::rendering::{Frame, HostView, Painter};
use crate::style::fetch::StyleFetch;
use crate::style::{resolve_glyph_url, StyleModel};
use crate::tiles::loader::TileFetch;
use crate::tiles::registry::SourceRegistry;
use crate::tiles::source::SourceDescriptor;
use crossbeam_channel::{unbounded, Receiver, Sender};
use instant::Instant;
use std::sync::Arc;
use std::time::Duration;

struct StyleLoadResult {
    generation: u64,
    base: String,
    result: crate::Result<String>,
}

/// What one update cycle observed, driving the repaint/re-arm decision
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    /// Something observable changed (drained reasons, new style, new tiles,
    /// camera movement)
    pub changed: bool,
    /// A camera transition is still in flight
    pub animating: bool,
}

pub struct UpdateCoordinator {
    // Dropped first so queued tile jobs drain before the registry and the
    // fetch seams they reference go away.
    workers: WorkerPool,
    state: Arc<SharedMapState>,
    handle: Arc<EngineHandle>,
    view: Arc<dyn HostView>,
    painter: Box<dyn Painter>,
    style_fetch: Arc<dyn StyleFetch>,
    tile_fetch: Arc<dyn TileFetch>,
    registry: SourceRegistry,
    style: Option<StyleModel>,
    glyph_url: Option<String>,
    /// Bumped on every style reload; loaders and in-flight completions carry
    /// the generation they were started under.
    style_generation: u64,
    style_inflight: bool,
    style_tx: Sender<StyleLoadResult>,
    style_rx: Receiver<StyleLoadResult>,
    annotation_descriptor: SourceDescriptor,
    /// Live synthetic tiles, replaced by invalidation hand-offs from the
    /// control thread
    annotation_tiles: HashMap<TileCoord, AnnotationTile>,
    annotations_dirty: bool,
    last_transform: TransformState,
    prepared: bool,
}

impl UpdateCoordinator {
    pub fn new(
        options: EngineOptions,
        state: Arc<SharedMapState>,
        handle: Arc<EngineHandle>,
        painter: Box<dyn Painter>,
        view: Arc<dyn HostView>,
        style_fetch: Arc<dyn StyleFetch>,
        tile_fetch: Arc<dyn TileFetch>,
    ) -> Self {
        let (style_tx, style_rx) = unbounded();
        let last_transform = state.with_transform(|transform| transform.snapshot());
        Self {
            workers: WorkerPool::new(options.worker_threads, "tile-worker"),
            registry: SourceRegistry::new(options.tile_cache_capacity),
            state,
            handle,
            view,
            painter,
            style_fetch,
            tile_fetch,
            style: None,
            glyph_url: None,
            style_generation: 0,
            style_inflight: false,
            style_tx,
            style_rx,
            annotation_descriptor: SourceDescriptor::annotations("annotations"),
            annotation_tiles: HashMap::default(),
            annotations_dirty: false,
            last_transform,
            prepared: false,
        }
    }

    pub(crate) fn view(&self) -> &dyn HostView {
        self.view.as_ref()
    }

    pub fn has_style(&self) -> bool {
        self.style.is_some()
    }

    pub fn glyph_url(&self) -> Option<&str> {
        self.glyph_url.as_deref()
    }

    /// Takes GPU-context ownership and performs one-time painter setup
    pub(crate) fn prepare(&mut self) {
        self.view.activate();
        if !self.prepared {
            self.painter.setup();
            self.prepared = true;
        }
    }

    /// Releases GPU-context ownership at teardown
    pub(crate) fn finish(&mut self) {
        self.view.deactivate();
    }

    /// One update cycle. Render-thread only (or the calling thread in static
    /// mode).
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let mask = self.handle.pending().drain();
        let mut changed = !mask.is_empty();

        if mask.contains(UpdateMask::STYLE_INFO) {
            self.reload_style();
        }
        changed |= self.apply_completed_styles();

        if mask.contains(UpdateMask::DEBUG) {
            self.painter.set_debug(self.state.debug());
        }
        if mask.intersects(UpdateMask::CLASSES | UpdateMask::DEFAULT_TRANSITION) {
            if let Some(style) = self.style.as_mut() {
                style.cascade(&self.state.classes(), self.state.default_transition());
            }
        }

        // The camera advances even with no style loaded, so panning and
        // zooming keep animating.
        let now = Instant::now();
        self.state.set_animation_time(now);
        let (snapshot, animating) = self.state.with_transform(|transform| {
            let animating = transform.step(now);
            (transform.snapshot(), animating)
        });
        changed |= snapshot != self.last_transform;
        self.last_transform = snapshot;

        if let Some(style) = &self.style {
            let handed = self.state.take_annotation_tiles();
            if !handed.is_empty() {
                changed = true;
                self.annotations_dirty = true;
                for tile in handed {
                    if tile.features.is_empty() {
                        self.annotation_tiles.remove(&tile.coord);
                    } else {
                        self.annotation_tiles.insert(tile.coord, tile);
                    }
                }
            }

            let mut wanted = style.active_source_descriptors();
            if !self.annotation_tiles.is_empty() {
                wanted.push(self.annotation_descriptor.clone());
            }
            self.registry
                .reconcile(&wanted, self.style_generation, &self.handle);

            self.painter.set_sprite_ratio(snapshot.pixel_ratio);
            changed |= self.registry.refresh_tiles(
                &snapshot,
                &self.workers,
                &self.tile_fetch,
                &self.handle,
                &self.annotation_tiles,
                self.annotations_dirty,
            );
            self.annotations_dirty = false;
        }

        CycleOutcome { changed, animating }
    }

    /// Begins loading the style named by the shared descriptor, discarding
    /// the current style and every loader built under it. Inline JSON goes
    /// through the same completion path as a fetch so stale-result rejection
    /// covers both.
    fn reload_style(&mut self) {
        let descriptor = self.state.style_descriptor();
        self.style = None;
        self.glyph_url = None;
        self.registry.clear();
        self.style_generation += 1;
        let generation = self.style_generation;

        if !descriptor.json.is_empty() {
            self.style_inflight = true;
            let _ = self.style_tx.send(StyleLoadResult {
                generation,
                base: descriptor.base,
                result: Ok(descriptor.json),
            });
        } else if !descriptor.url.is_empty() {
            self.style_inflight = true;
            log::info!("loading style from {}", descriptor.url);
            let tx = self.style_tx.clone();
            let handle = self.handle.clone();
            let base = descriptor.base;
            self.style_fetch.fetch(
                &descriptor.url,
                Box::new(move |result| {
                    let _ = tx.send(StyleLoadResult {
                        generation,
                        base,
                        result,
                    });
                    handle.request_update(UpdateMask::NOTHING);
                }),
            );
        } else {
            // Any older fetch is now stale; nothing new is outstanding
            self.style_inflight = false;
            log::warn!("style reload requested with neither url nor json set");
        }
    }

    /// Folds completed style loads into the cycle. A completion whose
    /// generation no longer matches was superseded and is dropped; an
    /// out-of-order network response can never resurrect an abandoned style.
    fn apply_completed_styles(&mut self) -> bool {
        let mut changed = false;
        while let Ok(load) = self.style_rx.try_recv() {
            if load.generation != self.style_generation {
                log::debug!(
                    "discarding superseded style response (generation {})",
                    load.generation
                );
                continue;
            }
            self.style_inflight = false;
            let json = match load.result {
                Ok(json) => json,
                Err(e) => {
                    log::error!("style load failed: {e}");
                    continue;
                }
            };
            match StyleModel::parse(&json) {
                Ok(mut style) => {
                    style.cascade(&self.state.classes(), self.state.default_transition());
                    self.glyph_url = style.glyphs.as_deref().map(|template| {
                        resolve_glyph_url(template, &load.base, &self.state.access_token())
                    });
                    log::info!(
                        "style applied: {} layers, {} sources",
                        style.layers.len(),
                        style.sources.len()
                    );
                    self.style = Some(style);
                    changed = true;
                    // Force a fresh cycle now that the style is ready
                    self.handle.request_update(UpdateMask::NOTHING);
                }
                Err(e) => log::error!("failed to parse style: {e}"),
            }
        }
        changed
    }

    /// Unconditionally draws the current scene. Skipped quietly when no style
    /// has been applied yet.
    pub(crate) fn render(&mut self) {
        let Some(style) = &self.style else {
            log::trace!("render requested with no style loaded");
            return;
        };
        let frame = Frame {
            style,
            sources: self.registry.snapshots(),
            transform: self.last_transform,
            clock: self.state.animation_time(),
            debug: self.state.debug(),
        };
        self.painter.draw(&frame);
    }

    /// True while a style fetch or any tile download is outstanding
    pub fn has_outstanding_work(&self) -> bool {
        self.style_inflight || self.registry.pending_tiles() > 0
    }

    /// Drives static mode on the calling thread: cycles until no
    /// asynchronous work remains, renders once, fires the frame signal.
    pub(crate) fn run_static(&mut self) {
        self.prepare();
        loop {
            self.run_cycle();
            if self.handle.pending().is_empty() && !self.has_outstanding_work() {
                break;
            }
            // Block briefly until a completion callback wakes us
            let _ = self.handle.recv_event_timeout(Duration::from_millis(50));
        }
        self.render();
        self.handle.frame_signal().notify();
        self.view.deactivate();
    }
}
