//! Scene context: the isolation boundary
//!
//! A context exclusively owns one registry, one scheduler, one effect
//! pipeline, one camera and one render surface. Controllers attach to it
//! through weak links so teardown can reach every controller still alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::core::config::{EngineConfig, SceneConfig};
use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::{CallbackId, ContextId, ControllerId, ControllerKey, NodeId, SlotMap};
use crate::render::{Camera, EffectPipeline, FramePacket, RenderDevice, RenderSurface};
use crate::scene::controller::ControllerCore;
use crate::scene::registry::SceneRegistry;
use crate::scene::scheduler::{FrameScheduler, TickReport};
use crate::scene::scope::ContextScope;

#[derive(Debug)]
struct Attachment {
    core: Weak<RefCell<ControllerCore>>,
    root: Option<NodeId>,
    callback: Option<CallbackId>,
}

/// One mounted scene
#[derive(Debug)]
pub struct SceneContext {
    id: ContextId,
    label: String,
    camera: Camera,
    surface: RenderSurface,
    registry: SceneRegistry,
    scheduler: FrameScheduler,
    effects: EffectPipeline,
    attached: SlotMap<ControllerKey, Attachment>,
    device: RenderDevice,
    torn_down: bool,
}

impl SceneContext {
    /// Allocate the camera, surface, registry, scheduler and pipeline for a scene
    pub fn mount(
        id: ContextId,
        config: &SceneConfig,
        device: &RenderDevice,
        engine: &EngineConfig,
    ) -> SceneResult<Self> {
        config.validate()?;
        let [width, height] = config.render_surface_size;
        let surface = RenderSurface::new(device, width, height)?;

        log::info!(
            "Mounted context {:?} '{}' at {}x{} ({:?})",
            id,
            config.label,
            width,
            height,
            config.scheduling_mode
        );
        Ok(Self {
            id,
            label: config.label.clone(),
            camera: Camera::from_config(config),
            surface,
            registry: SceneRegistry::new(id),
            scheduler: FrameScheduler::new(id, config.scheduling_mode, engine.frame_interval()),
            effects: EffectPipeline::new(id, device.clone(), (width, height)),
            attached: SlotMap::with_key(),
            device: device.clone(),
            torn_down: false,
        })
    }

    /// Context identity
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Label from the mount configuration
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Scope token for this context
    pub fn scope(&self) -> ContextScope {
        ContextScope::new(self.id)
    }

    /// Active camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Replace the active camera
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.scheduler.invalidate();
    }

    /// Render surface
    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// Scene graph
    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// Scene graph, mutably
    pub fn registry_mut(&mut self) -> &mut SceneRegistry {
        &mut self.registry
    }

    /// Frame scheduler
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Frame scheduler, mutably
    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }

    /// Effect pipeline
    pub fn effects(&self) -> &EffectPipeline {
        &self.effects
    }

    /// Effect pipeline, mutably
    pub fn effects_mut(&mut self) -> &mut EffectPipeline {
        &mut self.effects
    }

    /// Device the context renders with
    pub fn device(&self) -> &RenderDevice {
        &self.device
    }

    /// Controllers currently attached
    pub fn controller_count(&self) -> usize {
        self.attached.len()
    }

    /// Whether teardown has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Resize the surface, camera aspect and effect pipeline
    pub fn resize(&mut self, width: u32, height: u32) -> SceneResult<()> {
        if width == 0 || height == 0 {
            return Err(SceneError::InvalidConfig(format!(
                "render surface must be non-empty, got {width}x{height}"
            )));
        }
        self.surface.resize(width, height)?;
        self.camera.set_aspect_ratio(self.surface.aspect());
        self.effects.resize(width, height)?;
        self.scheduler.invalidate();
        log::debug!("Context {:?} resized to {}x{}", self.id, width, height);
        Ok(())
    }

    pub(crate) fn attach(&mut self, core: &Rc<RefCell<ControllerCore>>) -> ControllerId {
        let key = self.attached.insert(Attachment {
            core: Rc::downgrade(core),
            root: None,
            callback: None,
        });
        ControllerId::new(self.id, key)
    }

    pub(crate) fn update_attachment(
        &mut self,
        id: ControllerId,
        root: Option<NodeId>,
        callback: Option<CallbackId>,
    ) -> SceneResult<()> {
        let attachment = self
            .attached
            .get_mut(self.attachment_key(id)?)
            .ok_or(SceneError::NotFound { kind: "controller" })?;
        attachment.root = root;
        attachment.callback = callback;
        Ok(())
    }

    pub(crate) fn detach(&mut self, id: ControllerId) -> bool {
        self.attachment_key(id)
            .ok()
            .and_then(|key| self.attached.remove(key))
            .is_some()
    }

    fn attachment_key(&self, id: ControllerId) -> SceneResult<ControllerKey> {
        if id.context() == self.id {
            Ok(id.key())
        } else {
            Err(SceneError::ScopeViolation {
                caller: self.id,
                target: id.context(),
            })
        }
    }

    /// Remove nodes and callbacks of controllers dropped without `dispose`
    pub fn reap_orphans(&mut self) -> usize {
        let dead: Vec<ControllerKey> = self
            .attached
            .iter()
            .filter(|(_, a)| a.core.strong_count() == 0)
            .map(|(key, _)| key)
            .collect();

        let scope = self.scope();
        for key in &dead {
            let Some(attachment) = self.attached.remove(*key) else {
                continue;
            };
            if let Some(root) = attachment.root {
                if let Err(err) = self.registry.unregister(&scope, root) {
                    log::trace!("Orphan root {:?} already gone: {}", root, err);
                }
            }
            if let Some(callback) = attachment.callback {
                if let Err(err) = self.scheduler.deregister_callback(callback) {
                    log::trace!("Orphan callback {:?} already gone: {}", callback, err);
                }
            }
        }
        if !dead.is_empty() {
            log::debug!("Context {:?} reaped {} dropped controllers", self.id, dead.len());
        }
        dead.len()
    }

    /// Run one tick at host timestamp `now` and render it
    ///
    /// Returns `None` when the scheduler skipped this refresh.
    pub fn tick(&mut self, now: Duration) -> SceneResult<Option<TickReport>> {
        if self.torn_down {
            return Err(SceneError::ContextDestroyed(self.id));
        }
        self.reap_orphans();

        let scope = self.scope();
        let Some(report) = self.scheduler.run_tick(now, scope, &mut self.registry) else {
            return Ok(None);
        };
        self.render(report.frame_index)?;
        Ok(Some(report))
    }

    /// Submit the registry's current tree through the effect pipeline
    pub fn render(&self, frame_index: u64) -> SceneResult<()> {
        let packet = FramePacket {
            context: self.id,
            surface: self.surface.id(),
            frame_index,
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            draws: self.registry.collect_draws(),
            passes: self.effects.record(),
        };
        self.device.submit_frame(&packet)?;
        Ok(())
    }

    /// Stop the scheduler, release controllers, then the pipeline and surface
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scheduler.stop();

        let mut released = 0;
        for (_, attachment) in self.attached.drain() {
            let Some(core) = attachment.core.upgrade() else {
                continue;
            };
            match core.try_borrow_mut() {
                Ok(mut core) => released += core.release_by_context(),
                Err(_) => log::error!("Controller busy during teardown of context {:?}", self.id),
            };
        }

        self.registry.clear();
        self.effects.teardown();
        self.surface.release();
        log::info!(
            "Context {:?} '{}' torn down, {} controller handles released",
            self.id,
            self.label,
            released
        );
    }
}

impl Drop for SceneContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::ContextIds;
    use crate::render::{BloomPass, HeadlessBackend};
    use crate::scene::node::SceneNode;

    fn mount(device: &RenderDevice) -> SceneContext {
        SceneContext::mount(
            ContextIds::new().mint(),
            &SceneConfig::new("test"),
            device,
            &EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_mount_rejects_invalid_config() {
        let device = RenderDevice::headless();
        let config = SceneConfig::new("bad").with_surface_size(0, 0);
        let result = SceneContext::mount(ContextIds::new().mint(), &config, &device, &EngineConfig::default());
        assert!(matches!(result, Err(SceneError::InvalidConfig(_))));
        assert_eq!(device.stats().live_surfaces, 0);
    }

    #[test]
    fn test_tick_renders_registry() {
        let device = RenderDevice::headless();
        let mut ctx = mount(&device);
        let scope = ctx.scope();
        ctx.registry_mut().register(&scope, SceneNode::new("empty"), None).unwrap();

        let report = ctx.tick(Duration::ZERO).unwrap().unwrap();
        assert_eq!(report.frame_index, 1);
        let surface = ctx.surface().id();
        let frames = device
            .with_backend(|b: &HeadlessBackend| b.last_frame(surface).map(|f| f.frame_index))
            .flatten();
        assert_eq!(frames, Some(1));
    }

    #[test]
    fn test_resize_propagates() {
        let device = RenderDevice::headless();
        let mut ctx = mount(&device);
        ctx.effects_mut().add_pass(Box::new(BloomPass::new()), None).unwrap();

        ctx.resize(1000, 500).unwrap();
        assert_eq!(ctx.surface().size(), (1000, 500));
        assert!((ctx.camera().aspect - 2.0).abs() < 1e-6);
        assert_eq!(ctx.effects().size(), (1000, 500));
        assert!(matches!(ctx.resize(0, 10), Err(SceneError::InvalidConfig(_))));
    }

    #[test]
    fn test_teardown_releases_everything_once() {
        let device = RenderDevice::headless();
        let mut ctx = mount(&device);
        ctx.effects_mut().add_pass(Box::new(BloomPass::new()), None).unwrap();

        ctx.teardown();
        ctx.teardown();
        assert!(matches!(ctx.tick(Duration::ZERO), Err(SceneError::ContextDestroyed(_))));
        drop(ctx);

        let stats = device.stats();
        assert_eq!(stats.live_surfaces, 0);
        assert_eq!(stats.live_render_targets, 0);
        assert_eq!(stats.double_releases, 0);
    }
}
