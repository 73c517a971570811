//! Thread-safe holder of control-plane map state
//!
//! Mutated by the control thread through the accessors below and read by the
//! render thread under a snapshot/copy discipline. Compound fields that must
//! be read or replaced together sit behind their own mutex; independent
//! scalars are atomics. No accessor ever requires two locks at once.

use crate::annotations::AnnotationTile;
use crate::core::{config::EngineOptions, transform::Transform};
use instant::Instant;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Origin for the animation clock. Instants are stored as microseconds since
/// this epoch so the clock fits in an atomic.
static CLOCK_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Where the current style comes from. Exactly one of `url`/`json` is
/// authoritative; `base` resolves relative asset paths. Replaced wholesale,
/// never patched in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleDescriptor {
    pub url: String,
    pub base: String,
    pub json: String,
}

impl StyleDescriptor {
    /// Descriptor for a remote style; the base is everything up to and
    /// including the last slash of the URL.
    pub fn from_url(url: &str) -> Self {
        let base = match url.rfind('/') {
            Some(pos) => url[..=pos].to_string(),
            None => String::new(),
        };
        Self {
            url: url.to_string(),
            base,
            json: String::new(),
        }
    }

    pub fn from_json(json: &str, base: &str) -> Self {
        Self {
            url: String::new(),
            base: base.to_string(),
            json: json.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.json.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MapMode {
    /// Inert; no processing
    None = 0,
    /// A dedicated render thread runs repeatedly
    Continuous = 1,
    /// A single render pass on the calling thread
    Static = 2,
}

impl MapMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => MapMode::Continuous,
            2 => MapMode::Static,
            _ => MapMode::None,
        }
    }
}

pub struct SharedMapState {
    style: Mutex<StyleDescriptor>,
    access_token: Mutex<String>,
    classes: Mutex<Vec<String>>,
    transform: Mutex<Transform>,
    /// Materialized annotation tiles awaiting hand-off to the render thread
    annotation_tiles: Mutex<Vec<AnnotationTile>>,
    debug: AtomicBool,
    animation_time_micros: AtomicU64,
    default_transition_millis: AtomicU64,
    mode: AtomicU8,
}

impl SharedMapState {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            style: Mutex::new(StyleDescriptor::default()),
            access_token: Mutex::new(String::new()),
            classes: Mutex::new(Vec::new()),
            transform: Mutex::new(Transform::new(options)),
            annotation_tiles: Mutex::new(Vec::new()),
            debug: AtomicBool::new(false),
            animation_time_micros: AtomicU64::new(0),
            default_transition_millis: AtomicU64::new(options.default_transition.as_millis() as u64),
            mode: AtomicU8::new(MapMode::None as u8),
        }
    }

    pub fn style_descriptor(&self) -> StyleDescriptor {
        self.style.lock().unwrap().clone()
    }

    pub fn set_style_descriptor(&self, descriptor: StyleDescriptor) {
        *self.style.lock().unwrap() = descriptor;
    }

    pub fn access_token(&self) -> String {
        self.access_token.lock().unwrap().clone()
    }

    pub fn set_access_token(&self, token: &str) {
        *self.access_token.lock().unwrap() = token.to_string();
    }

    /// Adds the class if not yet set; returns whether it was added
    pub fn add_class(&self, class: &str) -> bool {
        let mut classes = self.classes.lock().unwrap();
        if classes.iter().any(|c| c == class) {
            return false;
        }
        classes.push(class.to_string());
        true
    }

    /// Removes the class if present; returns whether it was removed
    pub fn remove_class(&self, class: &str) -> bool {
        let mut classes = self.classes.lock().unwrap();
        let before = classes.len();
        classes.retain(|c| c != class);
        classes.len() != before
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.lock().unwrap().iter().any(|c| c == class)
    }

    pub fn classes(&self) -> Vec<String> {
        self.classes.lock().unwrap().clone()
    }

    /// Replaces the class list; returns whether it actually changed
    pub fn set_classes(&self, new_classes: &[String]) -> bool {
        let mut classes = self.classes.lock().unwrap();
        if *classes == new_classes {
            return false;
        }
        *classes = new_classes.to_vec();
        true
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Acquire)
    }

    pub fn set_debug(&self, value: bool) {
        self.debug.store(value, Ordering::Release);
    }

    /// Flips the debug flag, returning the new value
    pub fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn animation_time(&self) -> Instant {
        *CLOCK_EPOCH + Duration::from_micros(self.animation_time_micros.load(Ordering::Acquire))
    }

    pub fn set_animation_time(&self, time: Instant) {
        let micros = time.saturating_duration_since(*CLOCK_EPOCH).as_micros() as u64;
        self.animation_time_micros.store(micros, Ordering::Release);
    }

    pub fn default_transition(&self) -> Duration {
        Duration::from_millis(self.default_transition_millis.load(Ordering::Acquire))
    }

    pub fn set_default_transition(&self, duration: Duration) {
        self.default_transition_millis
            .store(duration.as_millis() as u64, Ordering::Release);
    }

    pub fn mode(&self) -> MapMode {
        MapMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: MapMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    /// Runs `f` with the live camera under its lock. The render thread uses
    /// this once per cycle to step transitions and take its snapshot; it
    /// never holds a reference into the transform across the call.
    pub fn with_transform<R>(&self, f: impl FnOnce(&mut Transform) -> R) -> R {
        f(&mut self.transform.lock().unwrap())
    }

    pub fn push_annotation_tiles(&self, tiles: Vec<AnnotationTile>) {
        self.annotation_tiles.lock().unwrap().extend(tiles);
    }

    pub fn take_annotation_tiles(&self) -> Vec<AnnotationTile> {
        std::mem::take(&mut *self.annotation_tiles.lock().unwrap())
    }
}
