//! Collaborator seams for the drawing subsystem and the host view
//!
//! The engine never draws; it hands a finalized [`Frame`] to a [`Painter`]
//! and asks the [`HostView`] to schedule render passes. Both are trait
//! objects supplied by the embedder.

use crate::core::geo::TileCoord;
use crate::core::transform::TransformState;
use crate::engine::thread::EngineHandle;
use crate::style::StyleModel;
use crate::tiles::source::{SourceKind, TileData};
use instant::Instant;
use std::sync::Arc;

/// Ready tiles of one source, captured for a single frame
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub id: String,
    pub kind: SourceKind,
    pub tiles: Vec<(TileCoord, Arc<TileData>)>,
}

/// Everything the drawing subsystem needs for one render pass. The transform
/// is an immutable snapshot taken earlier in the same cycle; nothing in a
/// frame aliases live, concurrently mutated state.
pub struct Frame<'a> {
    pub style: &'a StyleModel,
    pub sources: Vec<SourceSnapshot>,
    pub transform: TransformState,
    pub clock: Instant,
    pub debug: bool,
}

/// Drawing subsystem boundary. Called only from the thread that runs update
/// cycles (the render thread in continuous mode, the caller in static mode).
pub trait Painter: Send {
    /// One-time GPU state setup before the first frame
    fn setup(&mut self) {}
    fn set_debug(&mut self, _debug: bool) {}
    /// Pixel ratio for the sprite atlas, pushed whenever the viewport's ratio
    /// may have changed
    fn set_sprite_ratio(&mut self, _pixel_ratio: f64) {}
    fn draw(&mut self, frame: &Frame<'_>);
}

/// Host view boundary: owns the GPU context and repaint scheduling
pub trait HostView: Send + Sync {
    /// The render thread is taking ownership of the GPU context
    fn activate(&self) {}
    /// The render thread is releasing the GPU context (pause, teardown)
    fn deactivate(&self) {}
    /// A cycle produced something new to draw; the view decides when the
    /// render pass actually runs and triggers it through `handle`.
    fn schedule_repaint(&self, handle: &EngineHandle);
    /// Out-of-band notification hook for host event loops
    fn notify(&self) {}
}

/// View that renders immediately whenever asked, for headless operation
pub struct NullView;

impl HostView for NullView {
    fn schedule_repaint(&self, handle: &EngineHandle) {
        handle.trigger_render();
    }
}

/// Painter that draws nothing, for headless operation
#[derive(Default)]
pub struct NullPainter;

impl Painter for NullPainter {
    fn draw(&mut self, _frame: &Frame<'_>) {}
}
