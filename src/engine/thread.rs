//! Render thread ownership and cross-thread wake-up
//!
//! [`EngineHandle`] is the shared wake primitive: any thread can merge update
//! reasons, trigger renders or request termination through it; the render
//! thread drains the event queue in its run loop. [`RenderThreadController`]
//! owns the thread itself and the pause/resume/terminate state machine. The
//! render thread only observes flags and cooperatively parks or exits at the
//! single safe point at the top of its loop, never mid-frame.

use crate::engine::coordinator::UpdateCoordinator;
use crate::engine::signal::FrameSignal;
use crate::engine::update::{PendingUpdates, UpdateMask};
use crate::rendering::HostView;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineEvent {
    /// Pending update reasons may need draining
    Wake,
    /// A render pass was requested
    Render,
}

/// Pause handshake between the control thread and the render thread. The
/// render thread parks inside `park_if_pausing`; the control thread flips the
/// flag and waits for the park acknowledgment.
pub(crate) struct PauseGate {
    pausing: Mutex<bool>,
    run_condvar: Condvar,
    parked: Mutex<bool>,
    parked_condvar: Condvar,
}

impl PauseGate {
    fn new() -> Self {
        Self {
            pausing: Mutex::new(false),
            run_condvar: Condvar::new(),
            parked: Mutex::new(false),
            parked_condvar: Condvar::new(),
        }
    }

    pub(crate) fn request_pause(&self) {
        *self.pausing.lock().unwrap() = true;
    }

    pub(crate) fn resume(&self) {
        let mut pausing = self.pausing.lock().unwrap();
        *pausing = false;
        self.run_condvar.notify_all();
    }

    /// Blocks the control thread until the render thread has parked
    pub(crate) fn await_parked(&self) {
        let mut parked = self.parked.lock().unwrap();
        while !*parked {
            parked = self.parked_condvar.wait(parked).unwrap();
        }
    }

    /// Render-thread side: parks while pausing is requested, releasing the
    /// GPU context around the park.
    pub(crate) fn park_if_pausing(&self, view: &dyn HostView) {
        let mut pausing = self.pausing.lock().unwrap();
        while *pausing {
            view.deactivate();
            {
                let mut parked = self.parked.lock().unwrap();
                *parked = true;
                self.parked_condvar.notify_all();
            }
            pausing = self.run_condvar.wait(pausing).unwrap();
            view.activate();
        }
        *self.parked.lock().unwrap() = false;
    }
}

/// Shared wake primitive between the control thread, the render thread and
/// asynchronous completion callbacks. Every method is safe to call from any
/// thread.
pub struct EngineHandle {
    pending: PendingUpdates,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    terminating: AtomicBool,
    stopped: AtomicBool,
    pause: PauseGate,
    frame: FrameSignal,
}

impl EngineHandle {
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            pending: PendingUpdates::new(),
            events_tx,
            events_rx,
            terminating: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            pause: PauseGate::new(),
            frame: FrameSignal::new(),
        }
    }

    /// Merges `mask` into the pending reasons and wakes the render thread.
    /// In static mode there is no thread; the bits accumulate until the next
    /// inline cycle drains them.
    pub fn request_update(&self, mask: UpdateMask) {
        self.pending.merge(mask);
        let _ = self.events_tx.send(EngineEvent::Wake);
    }

    /// Asks for a render pass. Callable from any thread.
    pub fn trigger_render(&self) {
        let _ = self.events_tx.send(EngineEvent::Render);
    }

    /// Requests cooperative termination. Idempotent; safe from any thread.
    pub fn request_terminate(&self) {
        self.terminating.store(true, Ordering::Release);
        let _ = self.events_tx.send(EngineEvent::Wake);
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> &PendingUpdates {
        &self.pending
    }

    pub fn frame_signal(&self) -> &FrameSignal {
        &self.frame
    }

    pub(crate) fn pause_gate(&self) -> &PauseGate {
        &self.pause
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Clears termination state and stale events from a previous session,
    /// keeping pending update reasons intact.
    pub(crate) fn reset_for_start(&self) {
        self.terminating.store(false, Ordering::Release);
        self.stopped.store(false, Ordering::Release);
        while self.events_rx.try_recv().is_ok() {}
    }

    pub(crate) fn recv_event(&self) -> Option<EngineEvent> {
        self.events_rx.recv().ok()
    }

    pub(crate) fn try_recv_event(&self) -> Option<EngineEvent> {
        self.events_rx.try_recv().ok()
    }

    pub(crate) fn recv_event_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the dedicated render thread and its lifecycle state machine:
/// `Idle -> Running -> {Paused <-> Running} -> Terminating -> Idle`. Only the
/// control thread issues transitions.
pub struct RenderThreadController {
    handle: Arc<EngineHandle>,
    thread: Option<JoinHandle<UpdateCoordinator>>,
}

impl RenderThreadController {
    pub fn new(handle: Arc<EngineHandle>) -> Self {
        Self {
            handle,
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Spawns the render thread around `coordinator`. With `start_paused` the
    /// thread parks before its first cycle.
    pub fn start(&mut self, coordinator: UpdateCoordinator, start_paused: bool) {
        assert!(self.thread.is_none(), "render thread already started");
        self.handle.reset_for_start();
        if start_paused {
            self.handle.pause_gate().request_pause();
        }
        let handle = self.handle.clone();
        let join = thread::Builder::new()
            .name("map-render".to_string())
            .spawn(move || run_loop(coordinator, handle))
            .expect("failed to spawn render thread");
        self.thread = Some(join);
        // Prime the first cycle
        self.handle.request_update(UpdateMask::NOTHING);
    }

    /// Requests termination, unblocks a paused thread, and spins invoking
    /// `poll` until the thread has exited, so a host event loop can keep
    /// servicing itself instead of deadlocking. Returns the coordinator for
    /// later static use or restart.
    pub fn stop(&mut self, mut poll: impl FnMut()) -> UpdateCoordinator {
        let join = self
            .thread
            .take()
            .expect("stop called while the render thread is not running");
        self.handle.request_terminate();
        self.handle.pause_gate().resume();
        while !self.handle.is_stopped() {
            poll();
            thread::yield_now();
        }
        join.join().expect("render thread panicked")
    }

    /// Asks the render thread to park at its next safe point. With
    /// `wait_for_ack` the call blocks until the thread is parked. Reasons
    /// requested while paused are drained after resume.
    pub fn pause(&self, wait_for_ack: bool) {
        assert!(self.thread.is_some(), "pause called while the render thread is not running");
        self.handle.pause_gate().request_pause();
        // Make sure a thread blocked on the event queue reaches the safe point
        self.handle.request_update(UpdateMask::NOTHING);
        if wait_for_ack {
            self.handle.pause_gate().await_parked();
        }
    }

    pub fn resume(&self) {
        assert!(self.thread.is_some(), "resume called while the render thread is not running");
        self.handle.pause_gate().resume();
    }
}

/// The render thread's run loop. Coalesces queued events, drains pending
/// update reasons once per cycle, renders on request, and exits cooperatively
/// when termination is flagged, after one final drain of any reasons that
/// arrived late.
fn run_loop(mut coordinator: UpdateCoordinator, handle: Arc<EngineHandle>) -> UpdateCoordinator {
    handle.pause_gate().park_if_pausing(coordinator.view());
    coordinator.prepare();
    log::debug!("render thread running");

    while !handle.is_terminating() {
        let Some(first) = handle.recv_event() else {
            break;
        };
        let mut do_update = first == EngineEvent::Wake;
        let mut do_render = first == EngineEvent::Render;
        while let Some(event) = handle.try_recv_event() {
            match event {
                EngineEvent::Wake => do_update = true,
                EngineEvent::Render => do_render = true,
            }
        }

        handle.pause_gate().park_if_pausing(coordinator.view());
        if handle.is_terminating() {
            break;
        }

        if do_update || !handle.pending().is_empty() {
            let outcome = coordinator.run_cycle();
            if outcome.changed || outcome.animating {
                coordinator.view().schedule_repaint(&handle);
            }
            if outcome.animating {
                // Re-arm: keep cycling while transitions are in flight
                handle.request_update(UpdateMask::NOTHING);
            }
        }
        if do_render {
            coordinator.render();
            handle.frame_signal().notify();
        }
    }

    if !handle.pending().is_empty() {
        coordinator.run_cycle();
    }
    coordinator.finish();
    log::debug!("render thread exiting");
    handle.mark_stopped();
    coordinator
}
