//! Per-context frame scheduling
//!
//! A [`FrameScheduler`] decides whether a refresh becomes a tick and runs the
//! registered callbacks in registration order. The set run is a snapshot
//! taken at tick start; deregistrations and invalidations requested from
//! inside a tick are queued and applied once the tick finishes.
//!
//! ```text
//!            set_visibility(false)
//!  RUNNING ─────────────────────────▶ PAUSED
//!     ▲  ◀───────────────────────────   │
//!     │      set_visibility(true)       │
//!     └──────────── stop() ─────────────┴──▶ STOPPED
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::{CallbackId, CallbackKey, ContextId, NodeId, SlotMap};
use crate::foundation::time::FrameClock;
use crate::scene::node::SceneNode;
use crate::scene::registry::SceneRegistry;
use crate::scene::scope::ContextScope;

/// When a context ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingMode {
    /// Every display refresh
    #[default]
    Always,
    /// Only after `invalidate`, once per invalidation
    OnDemand,
}

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Stopped for good; the context is being torn down
    Stopped,
    /// Ticking
    Running,
    /// Host page hidden
    Paused,
}

/// Per-frame callback
pub type FrameCallback = Box<dyn FnMut(&mut FrameState<'_>) -> SceneResult<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerRequest {
    Invalidate,
    Deregister(CallbackId),
}

/// What a callback sees during one tick
pub struct FrameState<'a> {
    delta: f32,
    elapsed: f64,
    frame_index: u64,
    callback: CallbackId,
    scope: ContextScope,
    registry: &'a mut SceneRegistry,
    requests: &'a mut Vec<SchedulerRequest>,
}

impl FrameState<'_> {
    /// Seconds since the previous tick
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Scene time in seconds
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Index of the current tick
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Id of the callback being invoked
    pub fn callback(&self) -> CallbackId {
        self.callback
    }

    /// Scope of the ticking context
    pub fn scope(&self) -> ContextScope {
        self.scope
    }

    /// The context's registry
    pub fn registry(&self) -> &SceneRegistry {
        &*self.registry
    }

    /// The context's registry, mutably
    pub fn registry_mut(&mut self) -> &mut SceneRegistry {
        &mut *self.registry
    }

    /// Borrow a node of the ticking context
    pub fn node(&self, id: NodeId) -> SceneResult<&SceneNode> {
        self.registry.lookup(&self.scope, id)
    }

    /// Mutably borrow a node of the ticking context
    pub fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut SceneNode> {
        self.registry.node_mut(&self.scope, id)
    }

    /// Request another tick (on-demand mode)
    pub fn invalidate(&mut self) {
        self.requests.push(SchedulerRequest::Invalidate);
    }

    /// Deregister a callback once this tick finishes
    pub fn deregister(&mut self, id: CallbackId) {
        self.requests.push(SchedulerRequest::Deregister(id));
    }

    /// Deregister the running callback once this tick finishes
    pub fn deregister_self(&mut self) {
        let id = self.callback;
        self.deregister(id);
    }
}

/// Outcome of one tick
#[derive(Debug)]
pub struct TickReport {
    /// Tick index
    pub frame_index: u64,
    /// Delta handed to callbacks
    pub delta: f32,
    /// Callbacks invoked
    pub invoked: usize,
    /// Callbacks that returned an error
    pub failures: Vec<(CallbackId, SceneError)>,
}

/// Frame loop driver of one context
pub struct FrameScheduler {
    context: ContextId,
    mode: SchedulingMode,
    state: SchedulerState,
    clock: FrameClock,
    callbacks: SlotMap<CallbackKey, FrameCallback>,
    order: Vec<CallbackKey>,
    requests: Vec<SchedulerRequest>,
    invalidated: bool,
}

impl FrameScheduler {
    /// Running scheduler with no callbacks
    pub fn new(context: ContextId, mode: SchedulingMode, nominal_interval: Duration) -> Self {
        Self {
            context,
            mode,
            state: SchedulerState::Running,
            clock: FrameClock::new(nominal_interval),
            callbacks: SlotMap::with_key(),
            order: Vec::new(),
            requests: Vec::new(),
            // On-demand scenes still draw their first frame
            invalidated: true,
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Scheduling mode
    pub fn mode(&self) -> SchedulingMode {
        self.mode
    }

    /// Switch scheduling mode
    pub fn set_mode(&mut self, mode: SchedulingMode) {
        if self.mode != mode {
            log::debug!("Context {:?} scheduling mode {:?} -> {:?}", self.context, self.mode, mode);
            self.mode = mode;
            self.invalidated = true;
        }
    }

    /// Number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.order.len()
    }

    /// Whether `id` is registered
    pub fn is_registered(&self, id: CallbackId) -> bool {
        id.context() == self.context && self.callbacks.contains_key(id.key())
    }

    /// Frames ticked so far
    pub fn frame_count(&self) -> u64 {
        self.clock.frame_count()
    }

    /// Append a callback to the run order
    pub fn register_callback(&mut self, callback: FrameCallback) -> SceneResult<CallbackId> {
        if self.state == SchedulerState::Stopped {
            return Err(SceneError::ContextDestroyed(self.context));
        }
        let key = self.callbacks.insert(callback);
        self.order.push(key);
        Ok(CallbackId::new(self.context, key))
    }

    /// Remove a callback; returns whether it was registered
    pub fn deregister_callback(&mut self, id: CallbackId) -> SceneResult<bool> {
        if id.context() != self.context {
            return Err(SceneError::ScopeViolation {
                caller: self.context,
                target: id.context(),
            });
        }
        let removed = self.callbacks.remove(id.key()).is_some();
        if removed {
            self.order.retain(|&k| k != id.key());
        }
        Ok(removed)
    }

    /// Request a tick in on-demand mode
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Pause while the host page is hidden and resume when it is shown
    pub fn set_visibility(&mut self, visible: bool) {
        match (self.state, visible) {
            (SchedulerState::Running, false) => {
                log::debug!("Context {:?} paused", self.context);
                self.state = SchedulerState::Paused;
            }
            (SchedulerState::Paused, true) => {
                log::debug!("Context {:?} resumed", self.context);
                self.state = SchedulerState::Running;
                self.clock.mark_resumed();
            }
            _ => {}
        }
    }

    /// Stop ticking for good and drop every callback
    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
        self.order.clear();
        self.callbacks.clear();
        self.requests.clear();
    }

    /// Whether the next refresh becomes a tick
    pub fn should_tick(&self) -> bool {
        self.state == SchedulerState::Running
            && (self.mode == SchedulingMode::Always || self.invalidated)
    }

    /// Run one tick at host timestamp `now`, if this refresh is due one
    pub fn run_tick(
        &mut self,
        now: Duration,
        scope: ContextScope,
        registry: &mut SceneRegistry,
    ) -> Option<TickReport> {
        if !self.should_tick() {
            return None;
        }
        self.invalidated = false;

        let delta = self.clock.advance(now);
        let elapsed = self.clock.elapsed_secs();
        let frame_index = self.clock.frame_count();
        let snapshot = self.order.clone();
        let mut report = TickReport {
            frame_index,
            delta,
            invoked: 0,
            failures: Vec::new(),
        };

        for key in snapshot {
            let Some(callback) = self.callbacks.get_mut(key) else {
                continue;
            };
            let id = CallbackId::new(self.context, key);
            let mut frame = FrameState {
                delta,
                elapsed,
                frame_index,
                callback: id,
                scope,
                registry: &mut *registry,
                requests: &mut self.requests,
            };
            report.invoked += 1;
            if let Err(err) = callback(&mut frame) {
                log::error!("Frame callback {:?} in context {:?} failed: {}", id, self.context, err);
                report.failures.push((id, err));
            }
        }

        for request in std::mem::take(&mut self.requests) {
            match request {
                SchedulerRequest::Invalidate => self.invalidated = true,
                SchedulerRequest::Deregister(id) => {
                    if let Err(err) = self.deregister_callback(id) {
                        log::warn!("Ignoring deregistration of {:?}: {}", id, err);
                    }
                }
            }
        }

        log::trace!(
            "Context {:?} tick {} ran {} callbacks (delta {:.4}s)",
            self.context,
            frame_index,
            report.invoked,
            delta
        );
        Some(report)
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("context", &self.context)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("callbacks", &self.order.len())
            .field("invalidated", &self.invalidated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::ContextIds;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FRAME: Duration = Duration::from_micros(16_667);

    fn setup(mode: SchedulingMode) -> (FrameScheduler, SceneRegistry, ContextScope) {
        let id = ContextIds::new().mint();
        (
            FrameScheduler::new(id, mode, FRAME),
            SceneRegistry::new(id),
            ContextScope::new(id),
        )
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> FrameCallback {
        let log = Rc::clone(log);
        Box::new(move |_frame| {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::Always);
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["c1", "c2", "c3"] {
            scheduler.register_callback(recorder(&log, name)).unwrap();
        }

        for i in 0..3 {
            scheduler.run_tick(FRAME * i, scope, &mut registry).unwrap();
        }
        assert_eq!(log.borrow().len(), 9);
        assert!(log.borrow().chunks(3).all(|tick| tick == ["c1", "c2", "c3"]));
    }

    #[test]
    fn test_self_deregistration_mid_tick() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::Always);
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.register_callback(recorder(&log, "c1")).unwrap();
        let inner = Rc::clone(&log);
        scheduler
            .register_callback(Box::new(move |frame| {
                inner.borrow_mut().push("c2");
                frame.deregister_self();
                Ok(())
            }))
            .unwrap();
        scheduler.register_callback(recorder(&log, "c3")).unwrap();

        scheduler.run_tick(Duration::ZERO, scope, &mut registry).unwrap();
        assert_eq!(*log.borrow(), ["c1", "c2", "c3"]);
        assert_eq!(scheduler.callback_count(), 2);

        log.borrow_mut().clear();
        scheduler.run_tick(FRAME, scope, &mut registry).unwrap();
        assert_eq!(*log.borrow(), ["c1", "c3"]);
    }

    #[test]
    fn test_deregistering_a_later_callback_still_runs_it_this_tick() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::Always);
        let log = Rc::new(RefCell::new(Vec::new()));
        let target: Rc<RefCell<Option<CallbackId>>> = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&target);
        let inner = Rc::clone(&log);
        scheduler
            .register_callback(Box::new(move |frame| {
                inner.borrow_mut().push("killer");
                if let Some(id) = *slot.borrow() {
                    frame.deregister(id);
                }
                Ok(())
            }))
            .unwrap();
        let victim = scheduler.register_callback(recorder(&log, "victim")).unwrap();
        *target.borrow_mut() = Some(victim);

        scheduler.run_tick(Duration::ZERO, scope, &mut registry).unwrap();
        assert_eq!(*log.borrow(), ["killer", "victim"]);
        assert!(!scheduler.is_registered(victim));
    }

    #[test]
    fn test_errors_do_not_stop_remaining_callbacks() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::Always);
        let log = Rc::new(RefCell::new(Vec::new()));
        let failing = scheduler
            .register_callback(Box::new(|_| Err(SceneError::NotFound { kind: "node" })))
            .unwrap();
        scheduler.register_callback(recorder(&log, "after")).unwrap();

        let report = scheduler.run_tick(Duration::ZERO, scope, &mut registry).unwrap();
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, failing);
        assert_eq!(*log.borrow(), ["after"]);
    }

    #[test]
    fn test_visibility_pause_clamps_resume_delta() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::Always);
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&deltas);
        scheduler
            .register_callback(Box::new(move |frame| {
                sink.borrow_mut().push(frame.delta());
                Ok(())
            }))
            .unwrap();

        scheduler.run_tick(Duration::from_secs(1), scope, &mut registry).unwrap();
        scheduler.set_visibility(false);
        assert_eq!(scheduler.state(), SchedulerState::Paused);
        assert!(scheduler
            .run_tick(Duration::from_secs(2), scope, &mut registry)
            .is_none());

        scheduler.set_visibility(true);
        scheduler.run_tick(Duration::from_secs(3600), scope, &mut registry).unwrap();
        let resumed = *deltas.borrow().last().unwrap();
        assert!(resumed <= FRAME.as_secs_f32());
    }

    #[test]
    fn test_on_demand_ticks_once_per_invalidation() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::OnDemand);
        let log = Rc::new(RefCell::new(Vec::new()));
        scheduler.register_callback(recorder(&log, "c")).unwrap();

        // First frame is always drawn
        assert!(scheduler.run_tick(Duration::ZERO, scope, &mut registry).is_some());
        assert!(scheduler.run_tick(FRAME, scope, &mut registry).is_none());
        assert!(scheduler.run_tick(FRAME * 2, scope, &mut registry).is_none());

        scheduler.invalidate();
        assert!(scheduler.run_tick(FRAME * 3, scope, &mut registry).is_some());
        assert!(scheduler.run_tick(FRAME * 4, scope, &mut registry).is_none());
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_invalidate_from_callback_schedules_next_tick() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::OnDemand);
        let remaining = Rc::new(RefCell::new(2));
        let counter = Rc::clone(&remaining);
        scheduler
            .register_callback(Box::new(move |frame| {
                let mut left = counter.borrow_mut();
                if *left > 0 {
                    *left -= 1;
                    frame.invalidate();
                }
                Ok(())
            }))
            .unwrap();

        let ticks = (0..6)
            .filter_map(|i| scheduler.run_tick(FRAME * i, scope, &mut registry))
            .count();
        assert_eq!(ticks, 3);
    }

    #[test]
    fn test_stopped_scheduler_rejects_callbacks() {
        let (mut scheduler, mut registry, scope) = setup(SchedulingMode::Always);
        scheduler.register_callback(Box::new(|_| Ok(()))).unwrap();
        scheduler.stop();

        assert_eq!(scheduler.callback_count(), 0);
        assert!(scheduler.run_tick(Duration::ZERO, scope, &mut registry).is_none());
        assert!(matches!(
            scheduler.register_callback(Box::new(|_| Ok(()))),
            Err(SceneError::ContextDestroyed(_))
        ));
        scheduler.set_visibility(true);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
