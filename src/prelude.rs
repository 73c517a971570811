//! Prelude module for common mapcore types and traits
//!
//! Re-exports the most commonly used types for easy importing with
//! `use mapcore::prelude::*;`

pub use crate::core::{
    config::EngineOptions,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::Map,
    state::{MapMode, SharedMapState, StyleDescriptor},
    transform::{Transform, TransformState},
};

pub use crate::annotations::{Annotation, AnnotationIndex, AnnotationKind, AnnotationTile};

pub use crate::engine::{
    signal::FrameSignal,
    thread::EngineHandle,
    update::{PendingUpdates, UpdateMask},
};

pub use crate::rendering::{Frame, HostView, NullView, Painter, SourceSnapshot};

pub use crate::style::{fetch::StyleFetch, StyleModel};

pub use crate::tiles::{
    loader::TileFetch,
    source::{SourceDescriptor, SourceKind, TileData},
};

pub use crate::background::WorkerPool;

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::Arc,
    time::Duration,
};

pub use instant::Instant;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
