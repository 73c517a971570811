//! One-shot, rearmable frame-completion signal
//!
//! Lets a synchronous caller block until a render pass has completed. The
//! render thread calls [`FrameSignal::notify`] after every finished frame;
//! a caller rearms the signal, triggers a render, and waits.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct FrameSignal {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl FrameSignal {
    pub fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Clears a previously fired signal so the next `wait` blocks until a
    /// fresh `notify`.
    pub fn rearm(&self) {
        *self.fired.lock().unwrap() = false;
    }

    pub fn notify(&self) {
        let mut fired = self.fired.lock().unwrap();
        *fired = true;
        self.condvar.notify_all();
    }

    /// Blocks until the signal fires, then rearms it
    pub fn wait(&self) {
        let mut fired = self.fired.lock().unwrap();
        while !*fired {
            fired = self.condvar.wait(fired).unwrap();
        }
        *fired = false;
    }

    /// Like `wait`, but gives up after `timeout`. Returns whether the signal
    /// fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut fired = self.fired.lock().unwrap();
        while !*fired {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.condvar.wait_timeout(fired, deadline - now).unwrap();
            fired = guard;
        }
        *fired = false;
        true
    }
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_returns_after_notify() {
        let signal = Arc::new(FrameSignal::new());
        let notifier = {
            let signal = signal.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                signal.notify();
            })
        };
        signal.wait();
        notifier.join().unwrap();
    }

    #[test]
    fn test_wait_consumes_the_signal() {
        let signal = FrameSignal::new();
        signal.notify();
        assert!(signal.wait_timeout(Duration::from_millis(10)));
        // Rearmed by the successful wait
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_rearm_clears_stale_notification() {
        let signal = FrameSignal::new();
        signal.notify();
        signal.rearm();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }
}
