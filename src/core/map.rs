//! The public `Map` facade
//!
//! Every operation follows the same trigger pattern: mutate the shared state
//! (or the annotation index), then request an update so the render thread
//! folds the change into its next cycle. The facade itself never touches
//! render-thread state; in static mode it drives the coordinator inline.

use crate::annotations::AnnotationIndex;
use crate::core::config::EngineOptions;
use crate::core::geo::{LatLng, LatLngBounds, Point, TileCoord};
use crate::core::state::{MapMode, SharedMapState, StyleDescriptor};
use crate::engine::coordinator::UpdateCoordinator;
use crate::engine::thread::{EngineHandle, RenderThreadController};
use crate::engine::update::UpdateMask;
use crate::rendering::{HostView, Painter};
use crate::style::fetch::StyleFetch;
use crate::tiles::loader::TileFetch;
use crate::MapError;
use std::sync::Arc;
use std::time::Duration;

pub struct Map {
    state: Arc<SharedMapState>,
    handle: Arc<EngineHandle>,
    annotations: AnnotationIndex,
    controller: RenderThreadController,
    /// Present while the map is not running continuously; the render thread
    /// owns it otherwise.
    coordinator: Option<UpdateCoordinator>,
}

impl Map {
    pub fn new(
        options: EngineOptions,
        painter: Box<dyn Painter>,
        view: Arc<dyn HostView>,
        style_fetch: Arc<dyn StyleFetch>,
        tile_fetch: Arc<dyn TileFetch>,
    ) -> Self {
        let state = Arc::new(SharedMapState::new(&options));
        let handle = Arc::new(EngineHandle::new());
        let annotations =
            AnnotationIndex::new(options.annotation_zoom, options.default_point_symbol.clone());
        let coordinator = UpdateCoordinator::new(
            options,
            state.clone(),
            handle.clone(),
            painter,
            view,
            style_fetch,
            tile_fetch,
        );
        let controller = RenderThreadController::new(handle.clone());
        Self {
            state,
            handle,
            annotations,
            controller,
            coordinator: Some(coordinator),
        }
    }

    // --- Lifecycle -----------------------------------------------------------

    /// Spawns the render thread. With `start_paused` the thread parks before
    /// its first cycle until `resume` is called.
    pub fn start(&mut self, start_paused: bool) {
        assert_eq!(
            self.state.mode(),
            MapMode::None,
            "start called while the map is already running"
        );
        self.state.set_mode(MapMode::Continuous);
        let coordinator = self
            .coordinator
            .take()
            .expect("render thread owns the coordinator");
        self.controller.start(coordinator, start_paused);
        log::info!("map started");
    }

    /// Requests termination and blocks until the render thread has exited,
    /// invoking `poll` repeatedly so a host event loop can keep servicing
    /// itself while waiting.
    pub fn stop_with(&mut self, poll: impl FnMut()) {
        assert_eq!(
            self.state.mode(),
            MapMode::Continuous,
            "stop called while the map is not running"
        );
        let coordinator = self.controller.stop(poll);
        self.coordinator = Some(coordinator);
        self.state.set_mode(MapMode::None);
        log::info!("map stopped");
    }

    pub fn stop(&mut self) {
        self.stop_with(|| {});
    }

    /// Parks the render thread at its next safe point; with `wait_for_ack`
    /// blocks until it is parked. Update reasons requested while paused are
    /// drained after resume.
    pub fn pause(&self, wait_for_ack: bool) {
        assert_eq!(
            self.state.mode(),
            MapMode::Continuous,
            "pause called while the map is not running"
        );
        self.controller.pause(wait_for_ack);
    }

    pub fn resume(&self) {
        assert_eq!(
            self.state.mode(),
            MapMode::Continuous,
            "resume called while the map is not running"
        );
        self.controller.resume();
    }

    pub fn is_running(&self) -> bool {
        self.state.mode() == MapMode::Continuous
    }

    /// Blocks until one frame has been fully drawn. While running
    /// continuously this waits on the render thread; otherwise it performs a
    /// single static render pass on the calling thread, which requires a
    /// style to be configured.
    pub fn render_sync(&mut self) -> Result<(), MapError> {
        match self.state.mode() {
            MapMode::Continuous => {
                self.handle.frame_signal().rearm();
                self.handle.trigger_render();
                self.handle.frame_signal().wait();
                Ok(())
            }
            MapMode::None => {
                let coordinator = self
                    .coordinator
                    .as_mut()
                    .expect("render thread owns the coordinator");
                if self.state.style_descriptor().is_empty() && !coordinator.has_style() {
                    return Err(MapError::StyleNotSet);
                }
                self.state.set_mode(MapMode::Static);
                coordinator.run_static();
                self.state.set_mode(MapMode::None);
                Ok(())
            }
            MapMode::Static => unreachable!("static rendering re-entered"),
        }
    }

    // --- Style ---------------------------------------------------------------

    pub fn set_style_url(&self, url: &str) {
        self.state
            .set_style_descriptor(StyleDescriptor::from_url(url));
        self.handle.request_update(UpdateMask::STYLE_INFO);
    }

    pub fn set_style_json(&self, json: &str, base: &str) {
        self.state
            .set_style_descriptor(StyleDescriptor::from_json(json, base));
        self.handle.request_update(UpdateMask::STYLE_INFO);
    }

    /// The inline JSON of the current style descriptor; empty for URL styles
    pub fn style_json(&self) -> String {
        self.state.style_descriptor().json
    }

    pub fn set_access_token(&self, token: &str) {
        self.state.set_access_token(token);
    }

    pub fn access_token(&self) -> String {
        self.state.access_token()
    }

    // --- Classes, debug, transitions ----------------------------------------

    /// Adds a style class; returns whether state actually changed
    pub fn add_class(&self, class: &str) -> bool {
        let changed = self.state.add_class(class);
        if changed {
            self.handle.request_update(UpdateMask::CLASSES);
        }
        changed
    }

    /// Removes a style class; returns whether state actually changed
    pub fn remove_class(&self, class: &str) -> bool {
        let changed = self.state.remove_class(class);
        if changed {
            self.handle.request_update(UpdateMask::CLASSES);
        }
        changed
    }

    /// Replaces the class list; returns whether state actually changed
    pub fn set_classes(&self, classes: &[String]) -> bool {
        let changed = self.state.set_classes(classes);
        if changed {
            self.handle.request_update(UpdateMask::CLASSES);
        }
        changed
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.state.has_class(class)
    }

    pub fn classes(&self) -> Vec<String> {
        self.state.classes()
    }

    pub fn set_debug(&self, value: bool) {
        self.state.set_debug(value);
        self.handle.request_update(UpdateMask::DEBUG);
    }

    /// Flips the debug flag, returning the new value
    pub fn toggle_debug(&self) -> bool {
        let value = self.state.toggle_debug();
        self.handle.request_update(UpdateMask::DEBUG);
        value
    }

    pub fn debug(&self) -> bool {
        self.state.debug()
    }

    pub fn set_default_transition_duration(&self, duration: Duration) {
        self.state.set_default_transition(duration);
        self.handle
            .request_update(UpdateMask::DEFAULT_TRANSITION);
    }

    pub fn default_transition_duration(&self) -> Duration {
        self.state.default_transition()
    }

    // --- Camera --------------------------------------------------------------

    pub fn move_by(&self, dx: f64, dy: f64, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.move_by(dx, dy, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn set_center(&self, center: LatLng, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.set_center(center, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn center(&self) -> LatLng {
        self.state.with_transform(|transform| transform.center())
    }

    pub fn set_zoom(&self, zoom: f64, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.set_zoom(zoom, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn zoom(&self) -> f64 {
        self.state.with_transform(|transform| transform.zoom())
    }

    pub fn zoom_by(&self, delta: f64, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.zoom_by(delta, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn set_center_zoom(&self, center: LatLng, zoom: f64, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.set_center_zoom(center, zoom, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn set_bearing(&self, degrees: f64, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.set_bearing(degrees, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn bearing(&self) -> f64 {
        self.state.with_transform(|transform| transform.bearing())
    }

    /// Animates the bearing back to north
    pub fn reset_north(&self) {
        self.set_bearing(0.0, Some(Duration::from_millis(500)));
    }

    /// Snaps the camera back to the world origin
    pub fn reset_position(&self) {
        self.state.with_transform(|transform| {
            transform.set_bearing(0.0, None);
            transform.set_center_zoom(LatLng::default(), 0.0, None);
        });
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn set_pitch(&self, degrees: f64, duration: Option<Duration>) {
        self.state
            .with_transform(|transform| transform.set_pitch(degrees, duration));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn pitch(&self) -> f64 {
        self.state.with_transform(|transform| transform.pitch())
    }

    pub fn resize(&self, width: f64, height: f64, pixel_ratio: f64) {
        let changed = self
            .state
            .with_transform(|transform| transform.resize(width, height, pixel_ratio));
        if changed {
            self.handle.request_update(UpdateMask::NOTHING);
        }
    }

    pub fn cancel_transitions(&self) {
        self.state
            .with_transform(|transform| transform.cancel_transitions());
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn set_zoom_limits(&self, min_zoom: f64, max_zoom: f64) {
        self.state
            .with_transform(|transform| transform.set_zoom_limits(min_zoom, max_zoom));
        self.handle.request_update(UpdateMask::NOTHING);
    }

    pub fn min_zoom(&self) -> f64 {
        self.state.with_transform(|transform| transform.min_zoom())
    }

    pub fn max_zoom(&self) -> f64 {
        self.state.with_transform(|transform| transform.max_zoom())
    }

    pub fn pixel_for_lat_lng(&self, lat_lng: &LatLng) -> Point {
        self.state
            .with_transform(|transform| transform.snapshot().pixel_for_lat_lng(lat_lng))
    }

    pub fn lat_lng_for_pixel(&self, pixel: &Point) -> LatLng {
        self.state
            .with_transform(|transform| transform.snapshot().lat_lng_for_pixel(pixel))
    }

    // --- Annotations ---------------------------------------------------------

    pub fn set_default_point_annotation_symbol(&mut self, symbol: &str) {
        self.annotations.set_default_point_symbol(symbol);
    }

    pub fn add_point_annotation(&mut self, point: LatLng, symbol: &str) -> u32 {
        self.add_point_annotations(&[point], &[symbol.to_string()])[0]
    }

    pub fn add_point_annotations(&mut self, points: &[LatLng], symbols: &[String]) -> Vec<u32> {
        let (changed, ids) = self.annotations.add_points(points, symbols);
        self.publish_annotation_tiles(changed);
        ids
    }

    pub fn add_shape_annotations(&mut self, shapes: Vec<Vec<LatLng>>) -> Vec<u32> {
        let (changed, ids) = self.annotations.add_shapes(shapes);
        self.publish_annotation_tiles(changed);
        ids
    }

    pub fn remove_annotation(&mut self, id: u32) {
        self.remove_annotations(&[id]);
    }

    pub fn remove_annotations(&mut self, ids: &[u32]) {
        let changed = self.annotations.remove(ids);
        self.publish_annotation_tiles(changed);
    }

    pub fn annotations_in_bounds(&self, bounds: &LatLngBounds) -> Vec<u32> {
        self.annotations.query(bounds)
    }

    pub fn bounds_for_annotations(&self, ids: &[u32]) -> Option<LatLngBounds> {
        self.annotations.bounds_of(ids)
    }

    /// Materializes the changed tiles and hands them to the render thread as
    /// an opaque invalidation list; exactly those tiles regenerate.
    fn publish_annotation_tiles(&self, changed: Vec<TileCoord>) {
        if changed.is_empty() {
            return;
        }
        let tiles = changed
            .into_iter()
            .map(|coord| self.annotations.materialize(coord))
            .collect();
        self.state.push_annotation_tiles(tiles);
        self.handle.request_update(UpdateMask::ANNOTATIONS);
    }
}

impl Drop for Map {
    fn drop(&mut self) {
        if self.state.mode() == MapMode::Continuous {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::{NullPainter, NullView};
    use crate::style::fetch::HttpStyleFetch;
    use crate::tiles::loader::HttpTileFetch;

    fn map() -> Map {
        Map::new(
            EngineOptions::default(),
            Box::new(NullPainter),
            Arc::new(NullView),
            Arc::new(HttpStyleFetch),
            Arc::new(HttpTileFetch),
        )
    }

    #[test]
    fn test_class_edits_avoid_spurious_updates() {
        let map = map();
        assert!(map.add_class("night"));
        assert!(!map.add_class("night"));
        assert!(map.has_class("night"));
        assert!(map.remove_class("night"));
        assert!(!map.remove_class("night"));

        let classes = vec!["a".to_string()];
        assert!(map.set_classes(&classes));
        assert!(!map.set_classes(&classes));
    }

    #[test]
    fn test_camera_setters_are_observable() {
        let map = map();
        map.set_center_zoom(LatLng::new(48.85, 2.35), 11.0, None);
        assert_eq!(map.center(), LatLng::new(48.85, 2.35));
        assert_eq!(map.zoom(), 11.0);

        map.set_bearing(90.0, None);
        assert_eq!(map.bearing(), 90.0);
        map.reset_position();
        assert_eq!(map.center(), LatLng::default());
        assert_eq!(map.zoom(), 0.0);
        assert_eq!(map.bearing(), 0.0);
    }

    #[test]
    fn test_style_json_reflects_descriptor() {
        let map = map();
        assert!(map.style_json().is_empty());
        map.set_style_json("{\"layers\":[]}", "");
        assert_eq!(map.style_json(), "{\"layers\":[]}");
        map.set_style_url("https://example.org/style.json");
        assert!(map.style_json().is_empty());
    }

    #[test]
    fn test_annotation_edits_queue_invalidations() {
        let mut map = map();
        let id = map.add_point_annotation(LatLng::new(1.0, 1.0), "pin");
        let queued = map.state.take_annotation_tiles();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].features[0].id, id);

        map.remove_annotation(id);
        let queued = map.state.take_annotation_tiles();
        assert_eq!(queued.len(), 1);
        // The tile became empty; the render thread drops it
        assert!(queued[0].features.is_empty());
    }

    #[test]
    fn test_toggle_debug() {
        let map = map();
        assert!(map.toggle_debug());
        assert!(map.debug());
        assert!(!map.toggle_debug());
    }
}
