//! The live, animatable camera model and its immutable per-frame snapshot
//!
//! `Transform` is mutated by the control thread (behind the shared-state lock)
//! and stepped once per update cycle on the render thread. Rendering never
//! reads the live transform; it reads a [`TransformState`] snapshot taken
//! earlier in the same cycle.

use crate::core::{
    config::EngineOptions,
    geo::{LatLng, LatLngBounds, Point},
};
use instant::Instant;
use std::time::Duration;

/// Easing curves for camera transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    EaseOut,
    EaseInOutQuad,
}

impl Easing {
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// The full set of interpolated camera parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub center: LatLng,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

struct CameraTransition {
    from: CameraPose,
    to: CameraPose,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl CameraTransition {
    fn pose_at(&self, now: Instant) -> (CameraPose, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        let t = if self.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / self.duration.as_secs_f64()
        };
        let done = t >= 1.0;
        let k = self.easing.apply(t);
        let lerp = |a: f64, b: f64| a + (b - a) * k;
        let pose = CameraPose {
            center: LatLng::new(
                lerp(self.from.center.lat, self.to.center.lat),
                lerp(self.from.center.lng, self.to.center.lng),
            ),
            zoom: lerp(self.from.zoom, self.to.zoom),
            bearing: lerp(self.from.bearing, self.to.bearing),
            pitch: lerp(self.from.pitch, self.to.pitch),
        };
        (pose, done)
    }
}

/// Owns viewport geometry and animated camera transitions
pub struct Transform {
    center: LatLng,
    zoom: f64,
    bearing: f64,
    pitch: f64,
    size: Point,
    pixel_ratio: f64,
    min_zoom: f64,
    max_zoom: f64,
    transition: Option<CameraTransition>,
}

impl Transform {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            center: options.center,
            zoom: options.zoom.clamp(options.min_zoom, options.max_zoom),
            bearing: 0.0,
            pitch: 0.0,
            size: options.viewport_size,
            pixel_ratio: options.pixel_ratio,
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            transition: None,
        }
    }

    fn pose(&self) -> CameraPose {
        CameraPose {
            center: self.center,
            zoom: self.zoom,
            bearing: self.bearing,
            pitch: self.pitch,
        }
    }

    fn apply_pose(&mut self, pose: CameraPose) {
        self.center = LatLng::new(
            LatLng::clamp_lat(pose.center.lat),
            LatLng::wrap_lng(pose.center.lng),
        );
        self.zoom = pose.zoom.clamp(self.min_zoom, self.max_zoom);
        self.bearing = pose.bearing;
        self.pitch = pose.pitch.clamp(0.0, 60.0);
    }

    /// Installs a transition towards `target`, or applies it immediately when
    /// no duration is given. A new transition replaces any running one,
    /// starting from the currently interpolated pose.
    fn animate_to(&mut self, target: CameraPose, duration: Option<Duration>) {
        match duration {
            Some(d) if !d.is_zero() => {
                self.transition = Some(CameraTransition {
                    from: self.pose(),
                    to: target,
                    start: Instant::now(),
                    duration: d,
                    easing: Easing::EaseInOutQuad,
                });
            }
            _ => {
                self.transition = None;
                self.apply_pose(target);
            }
        }
    }

    pub fn set_center(&mut self, center: LatLng, duration: Option<Duration>) {
        let target = CameraPose { center, ..self.pose() };
        self.animate_to(target, duration);
    }

    pub fn set_zoom(&mut self, zoom: f64, duration: Option<Duration>) {
        let target = CameraPose {
            zoom: zoom.clamp(self.min_zoom, self.max_zoom),
            ..self.pose()
        };
        self.animate_to(target, duration);
    }

    pub fn zoom_by(&mut self, delta: f64, duration: Option<Duration>) {
        self.set_zoom(self.zoom + delta, duration);
    }

    pub fn set_center_zoom(&mut self, center: LatLng, zoom: f64, duration: Option<Duration>) {
        let target = CameraPose {
            center,
            zoom: zoom.clamp(self.min_zoom, self.max_zoom),
            ..self.pose()
        };
        self.animate_to(target, duration);
    }

    /// Moves the camera by a screen-space pixel offset
    pub fn move_by(&mut self, dx: f64, dy: f64, duration: Option<Duration>) {
        let world = self.center.to_world_pixel(self.zoom);
        let center = LatLng::from_world_pixel(world.subtract(&Point::new(dx, dy)), self.zoom);
        self.set_center(center, duration);
    }

    pub fn set_bearing(&mut self, degrees: f64, duration: Option<Duration>) {
        let target = CameraPose { bearing: degrees, ..self.pose() };
        self.animate_to(target, duration);
    }

    pub fn set_pitch(&mut self, degrees: f64, duration: Option<Duration>) {
        let target = CameraPose {
            pitch: degrees.clamp(0.0, 60.0),
            ..self.pose()
        };
        self.animate_to(target, duration);
    }

    /// Stops a running transition, freezing the camera at its current pose
    pub fn cancel_transitions(&mut self) {
        if let Some(transition) = self.transition.take() {
            let (pose, _) = transition.pose_at(Instant::now());
            self.apply_pose(pose);
        }
    }

    /// Updates the viewport size and pixel ratio; returns whether anything
    /// actually changed.
    pub fn resize(&mut self, width: f64, height: f64, pixel_ratio: f64) -> bool {
        let size = Point::new(width, height);
        if self.size == size && self.pixel_ratio == pixel_ratio {
            return false;
        }
        self.size = size;
        self.pixel_ratio = pixel_ratio;
        true
    }

    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
    }

    /// Advances any running transition to `now`. Returns true while a
    /// transition remains in flight after this step.
    pub fn step(&mut self, now: Instant) -> bool {
        let Some(transition) = &self.transition else {
            return false;
        };
        let (pose, done) = transition.pose_at(now);
        self.apply_pose(pose);
        if done {
            self.transition = None;
        }
        !done
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn bearing(&self) -> f64 {
        self.bearing
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn min_zoom(&self) -> f64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    /// Captures an immutable snapshot of the current camera parameters
    pub fn snapshot(&self) -> TransformState {
        TransformState {
            center: self.center,
            zoom: self.zoom,
            bearing: self.bearing,
            pitch: self.pitch,
            size: self.size,
            pixel_ratio: self.pixel_ratio,
        }
    }
}

/// Point-in-time snapshot of the camera, safe to read from the render path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub center: LatLng,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    pub size: Point,
    pub pixel_ratio: f64,
}

impl TransformState {
    /// The integer tile zoom this view is rendered at
    pub fn tile_zoom(&self) -> u8 {
        self.zoom.round().clamp(0.0, 22.0) as u8
    }

    /// Screen pixel position of a geographical coordinate
    pub fn pixel_for_lat_lng(&self, lat_lng: &LatLng) -> Point {
        let world = lat_lng.to_world_pixel(self.zoom);
        let origin = self
            .center
            .to_world_pixel(self.zoom)
            .subtract(&Point::new(self.size.x / 2.0, self.size.y / 2.0));
        world.subtract(&origin)
    }

    /// Geographical coordinate under a screen pixel position
    pub fn lat_lng_for_pixel(&self, pixel: &Point) -> LatLng {
        let origin = self
            .center
            .to_world_pixel(self.zoom)
            .subtract(&Point::new(self.size.x / 2.0, self.size.y / 2.0));
        LatLng::from_world_pixel(origin.add(pixel), self.zoom)
    }

    /// Geographic bounds of the axis-aligned viewport (bearing ignored)
    pub fn visible_bounds(&self) -> LatLngBounds {
        let north_west = self.lat_lng_for_pixel(&Point::new(0.0, 0.0));
        let south_east = self.lat_lng_for_pixel(&Point::new(self.size.x, self.size.y));
        LatLngBounds::from_coords(south_east.lat, north_west.lng, north_west.lat, south_east.lng)
    }
}
