//! Source registry: activation and tile lifecycle
//!
//! Mutated only by the render thread. Every cycle recomputes which sources
//! the current style references; a source that ends a cycle disabled loses
//! its loader the same cycle, and an enabled source lacking a loader gets one
//! constructed exactly once per descriptor.

use crate::annotations::AnnotationTile;
use crate::background::WorkerPool;
use crate::core::geo::TileCoord;
use crate::core::transform::TransformState;
use crate::engine::thread::EngineHandle;
use crate::engine::update::UpdateMask;
use crate::prelude::HashMap;
use crate::rendering::SourceSnapshot;
use crate::tiles::loader::{SourceLoader, TileFetch};
use crate::tiles::source::{SourceDescriptor, SourceKind};
use std::sync::Arc;

/// Construct/destroy counts of one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileStats {
    pub constructed: usize,
    pub destroyed: usize,
}

struct SourceState {
    enabled: bool,
    loader: Option<SourceLoader>,
}

pub struct SourceRegistry {
    sources: HashMap<SourceDescriptor, SourceState>,
    cache_capacity: usize,
}

impl SourceRegistry {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            sources: HashMap::default(),
            cache_capacity,
        }
    }

    /// Recomputes the enabled flags from `wanted`, destroys loaders of
    /// sources no longer referenced and constructs loaders for newly
    /// referenced ones. Newly constructed loaders get their first tile pass
    /// on a following cycle, requested through `handle`.
    pub fn reconcile(
        &mut self,
        wanted: &[SourceDescriptor],
        generation: u64,
        handle: &EngineHandle,
    ) -> ReconcileStats {
        for state in self.sources.values_mut() {
            state.enabled = false;
        }
        for descriptor in wanted {
            match self.sources.get_mut(descriptor) {
                Some(state) => state.enabled = true,
                None => {
                    self.sources.insert(
                        descriptor.clone(),
                        SourceState {
                            enabled: true,
                            loader: None,
                        },
                    );
                }
            }
        }

        let mut destroyed = 0;
        self.sources.retain(|descriptor, state| {
            if state.enabled {
                return true;
            }
            log::debug!("destroying loader for disabled source {}", descriptor.id);
            destroyed += 1;
            false
        });

        let mut constructed = 0;
        for (descriptor, state) in &mut self.sources {
            if state.loader.is_none() {
                log::debug!(
                    "constructing loader for source {} (generation {generation})",
                    descriptor.id
                );
                state.loader = Some(SourceLoader::new(
                    descriptor.clone(),
                    generation,
                    self.cache_capacity,
                ));
                constructed += 1;
            }
        }
        if constructed > 0 {
            handle.request_update(UpdateMask::NOTHING);
        }

        ReconcileStats {
            constructed,
            destroyed,
        }
    }

    /// Refreshes the tile set of every enabled source for the given camera
    /// snapshot. Returns whether any source's ready tiles changed.
    #[allow(clippy::too_many_arguments)]
    pub fn refresh_tiles(
        &mut self,
        snapshot: &TransformState,
        workers: &WorkerPool,
        fetch: &Arc<dyn TileFetch>,
        handle: &Arc<EngineHandle>,
        annotations: &HashMap<TileCoord, AnnotationTile>,
        annotations_dirty: bool,
    ) -> bool {
        let mut changed = false;
        for (descriptor, state) in &mut self.sources {
            let Some(loader) = state.loader.as_mut() else {
                continue;
            };
            changed |= match descriptor.kind {
                SourceKind::Annotations => {
                    loader.refresh_annotations(snapshot, annotations, annotations_dirty)
                }
                _ => loader.refresh(snapshot, workers, fetch, handle),
            };
        }
        changed
    }

    /// Drops every loader. Used when a style is replaced so data loaded under
    /// the previous style cannot be resurrected.
    pub fn clear(&mut self) {
        if !self.sources.is_empty() {
            log::debug!("dropping {} source loaders", self.sources.len());
            self.sources.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, descriptor: &SourceDescriptor) -> bool {
        self.sources.contains_key(descriptor)
    }

    /// Tiles submitted but not yet completed, across all sources
    pub fn pending_tiles(&self) -> usize {
        self.sources
            .values()
            .filter_map(|state| state.loader.as_ref())
            .map(|loader| loader.pending_count())
            .sum()
    }

    /// Per-source ready-tile captures for one frame, in stable order
    pub fn snapshots(&self) -> Vec<SourceSnapshot> {
        let mut out: Vec<SourceSnapshot> = self
            .sources
            .values()
            .filter_map(|state| state.loader.as_ref())
            .map(|loader| loader.snapshot())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> SourceDescriptor {
        SourceDescriptor {
            id: id.to_string(),
            kind: SourceKind::Raster,
            url_template: Some(format!("https://{id}.example.org/{{z}}/{{x}}/{{y}}.png")),
            tile_size: 256,
        }
    }

    #[test]
    fn test_reconcile_constructs_and_destroys() {
        let handle = EngineHandle::new();
        let mut registry = SourceRegistry::new(16);

        let stats = registry.reconcile(&[descriptor("a"), descriptor("b")], 1, &handle);
        assert_eq!(stats, ReconcileStats { constructed: 2, destroyed: 0 });
        assert_eq!(registry.len(), 2);

        let stats = registry.reconcile(&[descriptor("b")], 1, &handle);
        assert_eq!(stats, ReconcileStats { constructed: 0, destroyed: 1 });
        assert!(!registry.contains(&descriptor("a")));
        assert!(registry.contains(&descriptor("b")));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let handle = EngineHandle::new();
        let mut registry = SourceRegistry::new(16);
        let wanted = [descriptor("a"), descriptor("b")];

        registry.reconcile(&wanted, 1, &handle);
        let stats = registry.reconcile(&wanted, 1, &handle);
        assert_eq!(stats, ReconcileStats::default());
    }

    #[test]
    fn test_no_disabled_source_keeps_a_loader() {
        let handle = EngineHandle::new();
        let mut registry = SourceRegistry::new(16);
        registry.reconcile(&[descriptor("a"), descriptor("b")], 1, &handle);
        registry.reconcile(&[], 1, &handle);

        // After a reconcile every surviving entry is enabled and loaded
        assert!(registry.is_empty());
        for state in registry.sources.values() {
            assert!(state.enabled && state.loader.is_some());
        }
    }

    #[test]
    fn test_changed_connection_info_is_a_new_source() {
        let handle = EngineHandle::new();
        let mut registry = SourceRegistry::new(16);
        registry.reconcile(&[descriptor("a")], 1, &handle);

        let mut moved = descriptor("a");
        moved.url_template = Some("https://elsewhere.example.org/{z}/{x}/{y}.png".to_string());
        let stats = registry.reconcile(&[moved.clone()], 2, &handle);
        assert_eq!(stats, ReconcileStats { constructed: 1, destroyed: 1 });
        assert!(registry.contains(&moved));
    }
}
