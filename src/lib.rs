//! # mapcore
//!
//! The concurrency and update-coordination core of an interactive tiled-map
//! renderer.
//!
//! This library owns the dedicated render thread, serializes cross-thread
//! mutation of shared map state, coalesces independent change signals into a
//! single per-frame update cycle, and drives the lifecycle of data sources
//! (activate, load, deactivate) in lock-step with what the current style and
//! viewport need. Drawing, style cascading, tessellation and bitmap packing
//! are external collaborators reached through traits in [`rendering`] and
//! [`style`].

pub mod annotations;
pub mod background;
pub mod core;
pub mod engine;
pub mod prelude;
pub mod rendering;
pub mod style;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    config::EngineOptions,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::Map,
    state::{MapMode, SharedMapState, StyleDescriptor},
    transform::{Transform, TransformState},
};

pub use crate::annotations::{
    Annotation, AnnotationFeature, AnnotationIndex, AnnotationKind, AnnotationTile,
};

pub use crate::engine::{
    coordinator::{CycleOutcome, UpdateCoordinator},
    signal::FrameSignal,
    thread::{EngineHandle, RenderThreadController},
    update::{PendingUpdates, UpdateMask},
};

pub use crate::rendering::{Frame, HostView, NullPainter, NullView, Painter, SourceSnapshot};

pub use crate::style::{
    fetch::{HttpStyleFetch, StyleFetch, StyleFetchDone},
    StyleLayer, StyleModel, StyleSourceDef,
};

pub use crate::tiles::{
    loader::{HttpTileFetch, SourceLoader, TileFetch},
    registry::{ReconcileStats, SourceRegistry},
    source::{SourceDescriptor, SourceKind, TileData},
};

pub use crate::background::WorkerPool;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("style is not set")]
    StyleNotSet,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("style parse error: {0}")]
    Parse(String),

    #[error("source error: {0}")]
    Source(String),
}

/// Error type alias for convenience
pub type Error = MapError;
