//! Scene host: every mounted context on one device
//!
//! The host creates and destroys contexts, drives their frames from the
//! display refresh, and propagates page visibility. Contexts never see each
//! other; a failure inside one context is reported and the others keep
//! running.

use std::time::Duration;

use crate::assets::SharedResourcePool;
use crate::core::config::{EngineConfig, SceneConfig};
use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::{ContextId, ContextKey, HostTag, NodeId, SlotMap};
use crate::render::RenderDevice;
use crate::scene::context::SceneContext;
use crate::scene::node::SceneNode;
use crate::scene::scope::ContextScope;

/// Whether a context can accept controller attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAvailability {
    /// Reserved but not mounted yet
    Pending,
    /// Mounted
    Live,
    /// Destroyed, or never created by this host
    Gone,
}

#[derive(Debug)]
enum ContextSlot {
    Pending,
    Live(Box<SceneContext>),
}

/// Outcome of one display refresh across all contexts
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Contexts that ticked and rendered
    pub ticked: usize,
    /// Contexts whose scheduler skipped this refresh
    pub idle: usize,
    /// Callback and render failures, tagged by context
    pub failures: Vec<(ContextId, SceneError)>,
}

/// Owner of every scene context on one device
#[derive(Debug)]
pub struct SceneHost {
    config: EngineConfig,
    device: RenderDevice,
    tag: HostTag,
    contexts: SlotMap<ContextKey, ContextSlot>,
    shared: SharedResourcePool,
    page_visible: bool,
}

impl SceneHost {
    /// Create a host rendering with `device`
    pub fn new(config: EngineConfig, device: RenderDevice) -> SceneResult<Self> {
        config.validate()?;
        log::info!(
            "Scene host on '{}' at {} Hz",
            device.backend_name(),
            config.refresh_rate_hz
        );
        Ok(Self {
            config,
            device,
            tag: HostTag::next(),
            contexts: SlotMap::with_key(),
            shared: SharedResourcePool::new(),
            page_visible: true,
        })
    }

    /// Host with default configuration on a headless device
    pub fn headless() -> Self {
        Self {
            config: EngineConfig::default(),
            device: RenderDevice::headless(),
            tag: HostTag::next(),
            contexts: SlotMap::with_key(),
            shared: SharedResourcePool::new(),
            page_visible: true,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared render device
    pub fn device(&self) -> &RenderDevice {
        &self.device
    }

    /// Resources shared across controllers
    pub fn shared_pool(&self) -> &SharedResourcePool {
        &self.shared
    }

    /// Resources shared across controllers, mutably
    pub fn shared_pool_mut(&mut self) -> &mut SharedResourcePool {
        &mut self.shared
    }

    /// Create and mount a context in one step
    pub fn create_context(&mut self, config: &SceneConfig) -> SceneResult<ContextId> {
        config.validate()?;
        let (visible, tag) = (self.page_visible, self.tag);
        let (device, engine) = (&self.device, &self.config);
        let key = self.contexts.try_insert_with_key(|key| {
            let mut context = SceneContext::mount(ContextId::new(tag, key), config, device, engine)?;
            context.scheduler_mut().set_visibility(visible);
            Ok::<_, SceneError>(ContextSlot::Live(Box::new(context)))
        })?;
        Ok(ContextId::new(tag, key))
    }

    /// Reserve an id for a context that mounts later
    ///
    /// Controllers may build against a reserved id; their attach is
    /// deferred until [`mount_context`](Self::mount_context).
    pub fn reserve_context(&mut self) -> ContextId {
        let id = ContextId::new(self.tag, self.contexts.insert(ContextSlot::Pending));
        log::debug!("Reserved context {:?}", id);
        id
    }

    /// Mount a reserved context
    pub fn mount_context(&mut self, id: ContextId, config: &SceneConfig) -> SceneResult<ContextScope> {
        match self.slot(id) {
            None => return Err(SceneError::ContextDestroyed(id)),
            Some(ContextSlot::Live(_)) => {
                return Err(SceneError::InvalidConfig(format!("context {id:?} is already mounted")))
            }
            Some(ContextSlot::Pending) => {}
        }
        let mut context = SceneContext::mount(id, config, &self.device, &self.config)?;
        context.scheduler_mut().set_visibility(self.page_visible);
        let scope = context.scope();
        if let Some(slot) = self.slot_mut(id) {
            *slot = ContextSlot::Live(Box::new(context));
        }
        Ok(scope)
    }

    /// Tear down a context and free its id
    ///
    /// Live controllers targeting it are disposed; later calls on them fail.
    pub fn destroy_context(&mut self, id: ContextId) -> SceneResult<()> {
        let removed = self.owns(id).then(|| self.contexts.remove(id.key())).flatten();
        match removed {
            None => Err(SceneError::ContextDestroyed(id)),
            Some(ContextSlot::Pending) => {
                log::info!("Destroyed reserved context {:?}", id);
                Ok(())
            }
            Some(ContextSlot::Live(mut context)) => {
                context.teardown();
                let pruned = self.shared.prune();
                log::info!(
                    "Destroyed context {:?} '{}' ({} shared entries pruned)",
                    id,
                    context.label(),
                    pruned
                );
                Ok(())
            }
        }
    }

    /// Whether `id` is pending, live or gone
    pub fn availability(&self, id: ContextId) -> ContextAvailability {
        match self.slot(id) {
            None => ContextAvailability::Gone,
            Some(ContextSlot::Pending) => ContextAvailability::Pending,
            Some(ContextSlot::Live(_)) => ContextAvailability::Live,
        }
    }

    /// Tag shared by every context id this host mints
    pub fn tag(&self) -> HostTag {
        self.tag
    }

    fn owns(&self, id: ContextId) -> bool {
        id.host() == self.tag
    }

    fn slot(&self, id: ContextId) -> Option<&ContextSlot> {
        self.owns(id).then(|| self.contexts.get(id.key())).flatten()
    }

    fn slot_mut(&mut self, id: ContextId) -> Option<&mut ContextSlot> {
        if self.owns(id) {
            self.contexts.get_mut(id.key())
        } else {
            None
        }
    }

    /// Mounted context
    pub fn context(&self, id: ContextId) -> SceneResult<&SceneContext> {
        match self.slot(id) {
            None => Err(SceneError::ContextDestroyed(id)),
            Some(ContextSlot::Pending) => Err(SceneError::ContextUnavailable(id)),
            Some(ContextSlot::Live(context)) => Ok(&**context),
        }
    }

    /// Mounted context, mutably
    pub fn context_mut(&mut self, id: ContextId) -> SceneResult<&mut SceneContext> {
        match self.slot_mut(id) {
            None => Err(SceneError::ContextDestroyed(id)),
            Some(ContextSlot::Pending) => Err(SceneError::ContextUnavailable(id)),
            Some(ContextSlot::Live(context)) => Ok(&mut **context),
        }
    }

    /// Scope token of a mounted context
    pub fn scope(&self, id: ContextId) -> SceneResult<ContextScope> {
        self.context(id).map(SceneContext::scope)
    }

    /// Look up a node through `scope`'s registry
    pub fn lookup(&self, scope: &ContextScope, node: NodeId) -> SceneResult<&SceneNode> {
        self.context(scope.context())?.registry().lookup(scope, node)
    }

    /// Mounted context ids
    pub fn context_ids(&self) -> Vec<ContextId> {
        self.contexts
            .iter()
            .filter(|(_, slot)| matches!(slot, ContextSlot::Live(_)))
            .map(|(key, _)| ContextId::new(self.tag, key))
            .collect()
    }

    /// Number of contexts, reserved ones included
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the page is visible
    pub fn is_page_visible(&self) -> bool {
        self.page_visible
    }

    /// Pause or resume every context's scheduler
    pub fn set_page_visible(&mut self, visible: bool) {
        if self.page_visible == visible {
            return;
        }
        self.page_visible = visible;
        for (_, slot) in &mut self.contexts {
            if let ContextSlot::Live(context) = slot {
                context.scheduler_mut().set_visibility(visible);
            }
        }
        log::debug!("Page visibility changed to {}", visible);
    }

    /// Resize one context's surface
    pub fn resize(&mut self, id: ContextId, width: u32, height: u32) -> SceneResult<()> {
        self.context_mut(id)?.resize(width, height)
    }

    /// Drive one display refresh at host timestamp `now`
    pub fn frame(&mut self, now: Duration) -> FrameReport {
        let mut report = FrameReport::default();
        for (_, slot) in &mut self.contexts {
            let ContextSlot::Live(context) = slot else {
                continue;
            };
            let id = context.id();
            match context.tick(now) {
                Ok(Some(tick)) => {
                    report.ticked += 1;
                    for (callback, err) in tick.failures {
                        log::warn!("Callback {:?} in context {:?} failed: {}", callback, id, err);
                        report.failures.push((id, err));
                    }
                }
                Ok(None) => report.idle += 1,
                Err(err) => {
                    log::error!("Context {:?} failed to render: {}", id, err);
                    report.failures.push((id, err));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::scheduler::SchedulingMode;

    #[test]
    fn test_create_rejects_invalid_config() {
        let mut host = SceneHost::headless();
        let config = SceneConfig::new("bad").with_field_of_view(0.0);
        assert!(matches!(host.create_context(&config), Err(SceneError::InvalidConfig(_))));
        assert_eq!(host.context_count(), 0);
    }

    #[test]
    fn test_availability_transitions() {
        let mut host = SceneHost::headless();
        let id = host.reserve_context();
        assert_eq!(host.availability(id), ContextAvailability::Pending);
        assert!(matches!(host.context(id), Err(SceneError::ContextUnavailable(_))));

        host.mount_context(id, &SceneConfig::new("late")).unwrap();
        assert_eq!(host.availability(id), ContextAvailability::Live);
        assert!(host.mount_context(id, &SceneConfig::new("again")).is_err());

        host.destroy_context(id).unwrap();
        assert_eq!(host.availability(id), ContextAvailability::Gone);
        assert!(matches!(host.context(id), Err(SceneError::ContextDestroyed(_))));
        assert!(matches!(host.destroy_context(id), Err(SceneError::ContextDestroyed(_))));
    }

    #[test]
    fn test_frame_ticks_each_context() {
        let mut host = SceneHost::headless();
        host.create_context(&SceneConfig::new("always")).unwrap();
        host.create_context(&SceneConfig::new("demand").with_scheduling_mode(SchedulingMode::OnDemand))
            .unwrap();

        let first = host.frame(Duration::ZERO);
        assert_eq!(first.ticked, 2);

        let second = host.frame(Duration::from_millis(16));
        assert_eq!(second.ticked, 1);
        assert_eq!(second.idle, 1);
        assert_eq!(host.device().stats().frames_submitted, 3);
    }

    #[test]
    fn test_hidden_page_pauses_everything() {
        let mut host = SceneHost::headless();
        host.create_context(&SceneConfig::new("a")).unwrap();
        host.set_page_visible(false);
        host.create_context(&SceneConfig::new("b")).unwrap();

        let report = host.frame(Duration::ZERO);
        assert_eq!(report.ticked, 0);
        assert_eq!(report.idle, 2);

        host.set_page_visible(true);
        assert_eq!(host.frame(Duration::from_millis(16)).ticked, 2);
    }

    #[test]
    fn test_destroy_releases_surface() {
        let mut host = SceneHost::headless();
        let a = host.create_context(&SceneConfig::new("a")).unwrap();
        let b = host.create_context(&SceneConfig::new("b")).unwrap();
        assert_eq!(host.device().stats().live_surfaces, 2);

        host.destroy_context(a).unwrap();
        assert_eq!(host.device().stats().live_surfaces, 1);
        assert_eq!(host.context_ids(), vec![b]);
    }
}
