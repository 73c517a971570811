//! Coalesced update reasons
//!
//! Change notifications from the control thread are OR-merged into a single
//! pending bitmask and drained once per update cycle on the render thread.
//! Merging is commutative and idempotent; a drain atomically exchanges the
//! mask for zero, so no bit is ever lost or observed twice.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU32, Ordering};

/// A set of independent reasons the shared map state changed since the last
/// update cycle.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UpdateMask(u32);

impl UpdateMask {
    /// Wake the render thread without naming a reason
    pub const NOTHING: UpdateMask = UpdateMask(0);
    /// The style descriptor was replaced
    pub const STYLE_INFO: UpdateMask = UpdateMask(1 << 0);
    /// The debug flag changed
    pub const DEBUG: UpdateMask = UpdateMask(1 << 1);
    /// The default transition duration changed
    pub const DEFAULT_TRANSITION: UpdateMask = UpdateMask(1 << 2);
    /// The set of active style classes changed
    pub const CLASSES: UpdateMask = UpdateMask(1 << 3);
    /// Annotation tiles were invalidated
    pub const ANNOTATIONS: UpdateMask = UpdateMask(1 << 4);

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`
    pub fn contains(&self, other: UpdateMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any bit of `other` is set in `self`
    pub fn intersects(&self, other: UpdateMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        UpdateMask(bits)
    }
}

impl BitOr for UpdateMask {
    type Output = UpdateMask;

    fn bitor(self, rhs: UpdateMask) -> UpdateMask {
        UpdateMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for UpdateMask {
    fn bitor_assign(&mut self, rhs: UpdateMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for UpdateMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NOTHING");
        }
        let names = [
            (UpdateMask::STYLE_INFO, "STYLE_INFO"),
            (UpdateMask::DEBUG, "DEBUG"),
            (UpdateMask::DEFAULT_TRANSITION, "DEFAULT_TRANSITION"),
            (UpdateMask::CLASSES, "CLASSES"),
            (UpdateMask::ANNOTATIONS, "ANNOTATIONS"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The pending update mask shared between threads.
///
/// `merge` may be called from any thread; `drain` is called once per cycle by
/// the render thread and observes exactly the bitwise OR of everything merged
/// since the previous drain.
pub struct PendingUpdates(AtomicU32);

impl PendingUpdates {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn merge(&self, mask: UpdateMask) {
        self.0.fetch_or(mask.bits(), Ordering::AcqRel);
    }

    /// Atomically exchanges the pending mask for zero
    pub fn drain(&self) -> UpdateMask {
        UpdateMask::from_bits(self.0.swap(0, Ordering::AcqRel))
    }

    pub fn is_empty(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }

    /// Reads the mask without clearing it
    pub fn peek(&self) -> UpdateMask {
        UpdateMask::from_bits(self.0.load(Ordering::Acquire))
    }
}

impl Default for PendingUpdates {
    fn default() -> Self {
        Self::new()
    }
}
