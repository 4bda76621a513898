//! Object controller
//!
//! A controller owns the device handles of one procedural primitive and
//! drives it through its lifecycle:
//!
//! ```text
//! New ──build──▶ Built ──rebuild──▶ Rebuilding ──▶ Built
//!                  │                                  │
//!                  └────────────dispose───────────────┴──▶ Disposed
//! ```
//!
//! Nodes registered by the controller reference its handles by id only.
//! The context keeps a weak link to the controller's core so that context
//! teardown can release the handles of controllers that are still alive,
//! and reap the nodes of controllers dropped without `dispose`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::assets::{AssetPoll, AssetPromise, TextureData};
use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::{CallbackId, ContextId, ControllerId, NodeId};
use crate::procedural::{Animation, Blueprint, NodeTemplate, ProceduralBuilder, TexturePolicy};
use crate::render::{ResourceHandle, ResourceId, ResourceSet};
use crate::scene::context::SceneContext;
use crate::scene::host::{ContextAvailability, SceneHost};
use crate::scene::registry::SceneRegistry;
use crate::scene::scheduler::FrameCallback;
use crate::scene::scope::ContextScope;

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing allocated yet
    New,
    /// Handles allocated and, unless deferred, attached
    Built,
    /// Old handles disposed, replacements in progress
    Rebuilding,
    /// Terminal; every call fails with [`SceneError::ControllerDisposed`]
    Disposed,
}

/// Outcome of a successful build or rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Built from the requested parameters and attached
    Attached,
    /// Parameters were rejected; the fallback was attached instead
    Degraded,
    /// The context is not mounted yet; attach happens on a later `poll`
    Deferred,
}

/// Progress of an external texture binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    /// No texture requested
    None,
    /// Waiting on the promise
    Loading,
    /// Texture allocated and bound
    Bound,
    /// Load failed; the procedural material stays in use
    Failed,
}

/// State shared between a controller and the context it attached to
#[derive(Debug)]
pub(crate) struct ControllerCore {
    state: LifecycleState,
    resources: ResourceSet,
    texture: Option<Rc<ResourceHandle>>,
    root: Option<NodeId>,
    callback: Option<CallbackId>,
    attachment: Option<ControllerId>,
}

impl ControllerCore {
    fn new() -> Self {
        Self {
            state: LifecycleState::New,
            resources: ResourceSet::new(),
            texture: None,
            root: None,
            callback: None,
            attachment: None,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.state == LifecycleState::Built
    }

    /// Dispose everything and move to `Disposed`, returning the handles released
    pub(crate) fn release_by_context(&mut self) -> usize {
        let released = self.resources.dispose_all();
        self.texture = None;
        self.root = None;
        self.callback = None;
        self.attachment = None;
        self.state = LifecycleState::Disposed;
        released
    }
}

struct PendingAttach {
    blueprint: Blueprint,
    attempts: u32,
}

struct TextureBinding {
    state: TextureState,
    key: String,
    promise: Option<AssetPromise<TextureData>>,
    policy: TexturePolicy,
}

/// Lifecycle owner of one procedural primitive in one context
pub struct ObjectController<B: ProceduralBuilder> {
    target: ContextId,
    parent: Option<NodeId>,
    builder: B,
    core: Rc<RefCell<ControllerCore>>,
    params: Option<B::Params>,
    pending: Option<PendingAttach>,
    texture: TextureBinding,
    degraded: bool,
}

impl<B: ProceduralBuilder> ObjectController<B> {
    /// Controller that will attach to `target` under its root
    pub fn new(target: ContextId, builder: B) -> Self {
        Self {
            target,
            parent: None,
            builder,
            core: Rc::new(RefCell::new(ControllerCore::new())),
            params: None,
            pending: None,
            texture: TextureBinding {
                state: TextureState::None,
                key: String::new(),
                promise: None,
                policy: TexturePolicy::default(),
            },
            degraded: false,
        }
    }

    /// Attach under `parent` instead of the root
    #[must_use]
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.core.borrow().state
    }

    /// Context this controller targets
    pub fn target(&self) -> ContextId {
        self.target
    }

    /// Identity assigned by the context on first attach
    pub fn id(&self) -> Option<ControllerId> {
        self.core.borrow().attachment
    }

    /// Root node of the attached object
    pub fn root(&self) -> Option<NodeId> {
        self.core.borrow().root
    }

    /// Number of owned handles not yet disposed
    pub fn live_resources(&self) -> usize {
        self.core.borrow().resources.live_count()
    }

    /// Parameters of the last accepted build
    pub fn params(&self) -> Option<&B::Params> {
        self.params.as_ref()
    }

    /// Builder in use
    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Whether the attach is waiting on the context to mount
    pub fn is_deferred(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the fallback blueprint is attached
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Progress of the external texture
    pub fn texture_state(&self) -> TextureState {
        self.texture.state
    }

    /// Allocate and attach the object for `params`
    ///
    /// Out-of-domain parameters degrade to the builder's fallback. When the
    /// context is still pending the handles are allocated now and attached
    /// by a later [`poll`](Self::poll). Building an already built
    /// controller is a rebuild.
    pub fn build(&mut self, host: &mut SceneHost, params: B::Params) -> SceneResult<BuildStatus> {
        match self.state() {
            LifecycleState::Disposed => return Err(SceneError::ControllerDisposed),
            LifecycleState::Built | LifecycleState::Rebuilding => return self.rebuild(host, params),
            LifecycleState::New => {}
        }
        if host.availability(self.target) == ContextAvailability::Gone {
            self.release();
            return Err(SceneError::ContextUnavailable(self.target));
        }

        let blueprint = self.describe(&params)?;
        self.params = Some(params);
        self.install(host, blueprint)
    }

    /// Replace the object with one built from `params`
    ///
    /// Every superseded handle is disposed before any replacement is
    /// allocated. Parameters that fail for a non-recoverable reason leave
    /// the current object untouched.
    pub fn rebuild(&mut self, host: &mut SceneHost, params: B::Params) -> SceneResult<BuildStatus> {
        match self.state() {
            LifecycleState::Disposed => return Err(SceneError::ControllerDisposed),
            LifecycleState::New => return self.build(host, params),
            LifecycleState::Built | LifecycleState::Rebuilding => {}
        }
        if host.availability(self.target) == ContextAvailability::Gone {
            self.release();
            return Err(SceneError::ContextUnavailable(self.target));
        }

        let blueprint = self.describe(&params)?;
        self.params = Some(params);

        let superseded = {
            let mut core = self.core.borrow_mut();
            core.state = LifecycleState::Rebuilding;
            core.resources.dispose_all()
        };
        self.pending = None;
        self.detach_graph(host, true);
        log::debug!(
            "Rebuilding '{}': {} superseded handles disposed",
            self.builder.name(),
            superseded
        );

        self.install(host, blueprint)
    }

    /// Dispose every handle and remove the object from its context
    pub fn dispose(&mut self, host: &mut SceneHost) -> SceneResult<()> {
        if self.state() == LifecycleState::Disposed {
            return Err(SceneError::ControllerDisposed);
        }
        self.detach_graph(host, false);
        let released = self.release();
        log::debug!("Disposed '{}' ({} handles)", self.builder.name(), released);
        Ok(())
    }

    /// Request an external texture, bound once `promise` resolves
    ///
    /// Loads sharing `key` share one device texture.
    pub fn bind_texture(&mut self, promise: AssetPromise<TextureData>, key: impl Into<String>) -> SceneResult<()> {
        if self.state() == LifecycleState::Disposed {
            return Err(SceneError::ControllerDisposed);
        }
        self.texture.key = key.into();
        self.texture.promise = Some(promise);
        self.texture.state = TextureState::Loading;
        Ok(())
    }

    /// Retry a deferred attach and check the texture promise
    ///
    /// A deferred attach gives up after the host's retry budget, failing
    /// with [`SceneError::ContextUnavailable`] and disposing every handle.
    pub fn poll(&mut self, host: &mut SceneHost) -> SceneResult<()> {
        if self.state() == LifecycleState::Disposed {
            return Err(SceneError::ControllerDisposed);
        }
        self.poll_pending(host)?;
        self.poll_texture(host)
    }

    fn describe(&mut self, params: &B::Params) -> SceneResult<Blueprint> {
        match self.builder.describe(params) {
            Ok(blueprint) => {
                self.degraded = false;
                Ok(blueprint)
            }
            Err(err) if err.is_recoverable() => {
                log::warn!("{} rejected {:?}: {}; using fallback", self.builder.name(), params, err);
                self.degraded = true;
                Ok(self.builder.fallback())
            }
            Err(err) => Err(err),
        }
    }

    /// Materialize `blueprint` and attach or defer it
    fn install(&mut self, host: &mut SceneHost, blueprint: Blueprint) -> SceneResult<BuildStatus> {
        let device = host.device().clone();
        match blueprint.materialize(&device) {
            Ok(resources) => self.place(host, blueprint, resources),
            Err(err) => {
                log::error!("{} materialize failed: {}; attaching fallback", self.builder.name(), err);
                self.degraded = true;
                self.place(host, self.builder.fallback(), ResourceSet::new())?;
                Err(err)
            }
        }
    }

    fn place(
        &mut self,
        host: &mut SceneHost,
        blueprint: Blueprint,
        mut resources: ResourceSet,
    ) -> SceneResult<BuildStatus> {
        self.texture.policy = blueprint.node.texture_policy;
        match host.availability(self.target) {
            ContextAvailability::Live => {
                self.attach(host, &blueprint, resources)?;
                Ok(if self.degraded {
                    BuildStatus::Degraded
                } else {
                    BuildStatus::Attached
                })
            }
            ContextAvailability::Pending => {
                {
                    let mut core = self.core.borrow_mut();
                    core.resources = resources;
                    core.state = LifecycleState::Built;
                }
                self.pending = Some(PendingAttach {
                    blueprint,
                    attempts: 0,
                });
                log::debug!("'{}' deferred until {:?} mounts", self.builder.name(), self.target);
                Ok(BuildStatus::Deferred)
            }
            ContextAvailability::Gone => {
                resources.dispose_all();
                self.release();
                Err(SceneError::ContextUnavailable(self.target))
            }
        }
    }

    /// Register the node tree and frame callback in the target context
    fn attach(&mut self, host: &mut SceneHost, blueprint: &Blueprint, resources: ResourceSet) -> SceneResult<()> {
        let context = host.context_mut(self.target)?;
        let scope = context.scope();

        let existing = self.core.borrow().attachment;
        let controller_id = match existing {
            Some(id) => id,
            None => {
                let id = context.attach(&self.core);
                self.core.borrow_mut().attachment = Some(id);
                id
            }
        };

        let root = match register_template(
            context.registry_mut(),
            &scope,
            &blueprint.node,
            &resources,
            self.parent,
            controller_id,
        ) {
            Ok(root) => root,
            Err(err) => {
                context.detach(controller_id);
                let mut core = self.core.borrow_mut();
                core.attachment = None;
                if core.state == LifecycleState::Rebuilding {
                    core.state = LifecycleState::Built;
                }
                return Err(err);
            }
        };

        let callback = match blueprint.animation {
            Some(animation) => Some(
                context
                    .scheduler_mut()
                    .register_callback(animate(Rc::downgrade(&self.core), root, animation))?,
            ),
            None => None,
        };

        let shared_texture = self.core.borrow().texture.as_ref().map(|t| t.id());
        if let Some(texture) = shared_texture {
            apply_texture(context, root, texture, self.texture.policy)?;
        }

        context.update_attachment(controller_id, Some(root), callback)?;
        context.scheduler_mut().invalidate();

        let mut core = self.core.borrow_mut();
        log::debug!(
            "'{}' attached at {:?} with {} handles",
            self.builder.name(),
            root,
            resources.len()
        );
        core.resources = resources;
        core.root = Some(root);
        core.callback = callback;
        core.state = LifecycleState::Built;
        Ok(())
    }

    /// Remove the node tree and callback, optionally keeping the attachment slot
    fn detach_graph(&mut self, host: &mut SceneHost, keep_attachment: bool) {
        let (root, callback, attachment) = {
            let mut core = self.core.borrow_mut();
            let attachment = if keep_attachment {
                core.attachment
            } else {
                core.attachment.take()
            };
            (core.root.take(), core.callback.take(), attachment)
        };
        let Ok(context) = host.context_mut(self.target) else {
            return;
        };
        let scope = context.scope();

        if let Some(root) = root {
            if let Err(err) = context.registry_mut().unregister(&scope, root) {
                log::trace!("Root {:?} already removed: {}", root, err);
            }
        }
        if let Some(callback) = callback {
            if let Err(err) = context.scheduler_mut().deregister_callback(callback) {
                log::trace!("Callback {:?} already deregistered: {}", callback, err);
            }
        }
        match attachment {
            Some(id) if keep_attachment => {
                if let Err(err) = context.update_attachment(id, None, None) {
                    log::trace!("Attachment {:?} already detached: {}", id, err);
                }
            }
            Some(id) => {
                context.detach(id);
            }
            None => {}
        }
        context.scheduler_mut().invalidate();
    }

    fn release(&mut self) -> usize {
        self.pending = None;
        self.texture.promise = None;
        self.core.borrow_mut().release_by_context()
    }

    fn poll_pending(&mut self, host: &mut SceneHost) -> SceneResult<()> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        match host.availability(self.target) {
            ContextAvailability::Live => {
                let resources = std::mem::take(&mut self.core.borrow_mut().resources);
                self.attach(host, &pending.blueprint, resources)
            }
            ContextAvailability::Pending => {
                pending.attempts += 1;
                let budget = host.config().attach_retry_budget;
                if pending.attempts >= budget {
                    let released = self.release();
                    log::warn!(
                        "'{}' gave up on {:?} after {} attempts; {} handles disposed",
                        self.builder.name(),
                        self.target,
                        pending.attempts,
                        released
                    );
                    return Err(SceneError::ContextUnavailable(self.target));
                }
                self.pending = Some(pending);
                Ok(())
            }
            ContextAvailability::Gone => {
                self.release();
                Err(SceneError::ContextUnavailable(self.target))
            }
        }
    }

    fn poll_texture(&mut self, host: &mut SceneHost) -> SceneResult<()> {
        let Some(promise) = self.texture.promise.as_mut() else {
            return Ok(());
        };
        match promise.poll() {
            AssetPoll::Pending => Ok(()),
            AssetPoll::Failed(err) => {
                log::warn!("Texture '{}' failed to load: {}", self.texture.key, err);
                self.texture.promise = None;
                self.texture.state = TextureState::Failed;
                Ok(())
            }
            AssetPoll::Ready(data) => {
                self.texture.promise = None;
                let device = host.device().clone();
                let key = self.texture.key.clone();
                let handle = match host
                    .shared_pool_mut()
                    .get_or_allocate(&key, &device, || data.to_desc(key.as_str()))
                {
                    Ok(handle) => handle,
                    Err(err) => {
                        self.texture.state = TextureState::Failed;
                        return Err(err.into());
                    }
                };
                let texture = handle.id();
                let root = {
                    let mut core = self.core.borrow_mut();
                    core.texture = Some(handle);
                    core.root
                };
                self.texture.state = TextureState::Bound;

                if let Some(root) = root {
                    let context = host.context_mut(self.target)?;
                    apply_texture(context, root, texture, self.texture.policy)?;
                    context.scheduler_mut().invalidate();
                }
                Ok(())
            }
        }
    }
}

impl<B: ProceduralBuilder> fmt::Debug for ObjectController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectController")
            .field("builder", &self.builder.name())
            .field("target", &self.target)
            .field("state", &self.state())
            .field("root", &self.root())
            .field("deferred", &self.is_deferred())
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

fn register_template(
    registry: &mut SceneRegistry,
    scope: &ContextScope,
    template: &NodeTemplate,
    resources: &ResourceSet,
    parent: Option<NodeId>,
    owner: ControllerId,
) -> SceneResult<NodeId> {
    let id = registry.register(scope, template.instantiate(resources, Some(owner)), parent)?;
    for child in &template.children {
        register_template(registry, scope, child, resources, Some(id), owner)?;
    }
    Ok(id)
}

fn apply_texture(
    context: &mut SceneContext,
    root: NodeId,
    texture: ResourceId,
    policy: TexturePolicy,
) -> SceneResult<()> {
    let scope = context.scope();
    let device = context.device().clone();
    let node = context.registry_mut().node_mut(&scope, root)?;
    let Some(renderable) = node.renderable.as_mut() else {
        return Ok(());
    };
    renderable.texture = Some(texture);
    policy.apply(&mut renderable.material_state);
    if let Some(material) = renderable.material {
        device.update_material(material, &renderable.material_state)?;
    }
    Ok(())
}

/// Frame callback that animates `node` while the controller is live
fn animate(core: Weak<RefCell<ControllerCore>>, node: NodeId, animation: Animation) -> FrameCallback {
    Box::new(move |frame| {
        let Some(core) = core.upgrade() else {
            return Ok(());
        };
        let live = match core.try_borrow() {
            Ok(core) => core.is_live() && core.root == Some(node),
            Err(_) => false,
        };
        if !live {
            return Ok(());
        }

        let (elapsed, delta) = (frame.elapsed(), frame.delta());
        match frame.node_mut(node) {
            Ok(target) => animation.apply(target, elapsed, delta),
            // Removed earlier in this tick
            Err(SceneError::NotFound { .. }) => return Ok(()),
            Err(err) => return Err(err),
        }
        frame.invalidate();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::promise;
    use crate::core::config::SceneConfig;
    use crate::procedural::{SphereBuilder, SphereParams, Spin};
    use crate::render::{HeadlessBackend, ResourceKind};

    fn host_with_scene() -> (SceneHost, ContextId) {
        let mut host = SceneHost::headless();
        let id = host.create_context(&SceneConfig::new("main")).unwrap();
        (host, id)
    }

    #[test]
    fn test_build_attaches_and_owns_handles() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);

        let status = sphere.build(&mut host, SphereParams::default()).unwrap();
        assert_eq!(status, BuildStatus::Attached);
        assert_eq!(sphere.state(), LifecycleState::Built);
        assert_eq!(sphere.live_resources(), 2);

        let scope = host.scope(ctx).unwrap();
        let node = host.lookup(&scope, sphere.root().unwrap()).unwrap();
        assert_eq!(node.owner, sphere.id());
        assert_eq!(host.context(ctx).unwrap().controller_count(), 1);
    }

    #[test]
    fn test_invalid_params_degrade_to_fallback() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        let params = SphereParams {
            radius: -1.0,
            ..SphereParams::default()
        };

        let status = sphere.build(&mut host, params).unwrap();
        assert_eq!(status, BuildStatus::Degraded);
        assert!(sphere.is_degraded());
        assert_eq!(sphere.live_resources(), 0);
        assert!(sphere.root().is_some());
    }

    #[test]
    fn test_rebuild_disposes_before_allocating() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        sphere.build(&mut host, SphereParams::default()).unwrap();
        let old_root = sphere.root().unwrap();

        let params = SphereParams {
            radius: 2.0,
            ..SphereParams::default()
        };
        assert_eq!(sphere.build(&mut host, params).unwrap(), BuildStatus::Attached);
        assert_eq!(sphere.live_resources(), 2);
        assert_ne!(sphere.root(), Some(old_root));
        assert!(!host.context(ctx).unwrap().registry().contains(old_root));

        let stats = host.device().stats();
        assert_eq!(stats.live_geometries, 1);
        assert_eq!(stats.live_materials, 1);
        assert_eq!(stats.released, 2);
    }

    #[test]
    fn test_dispose_twice_fails() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        sphere.build(&mut host, SphereParams::default()).unwrap();
        let root = sphere.root().unwrap();

        sphere.dispose(&mut host).unwrap();
        assert_eq!(sphere.state(), LifecycleState::Disposed);
        assert!(!host.context(ctx).unwrap().registry().contains(root));
        assert_eq!(host.device().stats().live_resources(), 0);

        assert!(matches!(sphere.dispose(&mut host), Err(SceneError::ControllerDisposed)));
        assert!(matches!(
            sphere.build(&mut host, SphereParams::default()),
            Err(SceneError::ControllerDisposed)
        ));
    }

    #[test]
    fn test_spin_callback_rotates_node() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        let params = SphereParams {
            spin: Some(Spin {
                axis: [0.0, 1.0, 0.0],
                radians_per_second: 1.0,
            }),
            ..SphereParams::default()
        };
        sphere.build(&mut host, params).unwrap();
        let before = host
            .lookup(&host.scope(ctx).unwrap(), sphere.root().unwrap())
            .unwrap()
            .transform
            .clone();

        host.frame(std::time::Duration::ZERO);
        let scope = host.scope(ctx).unwrap();
        let after = &host.lookup(&scope, sphere.root().unwrap()).unwrap().transform;
        assert_ne!(&before, after);
    }

    #[test]
    fn test_deferred_attach_on_mount() {
        let mut host = SceneHost::headless();
        let ctx = host.reserve_context();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);

        assert_eq!(sphere.build(&mut host, SphereParams::default()).unwrap(), BuildStatus::Deferred);
        assert!(sphere.is_deferred());
        assert_eq!(sphere.live_resources(), 2);
        assert!(sphere.root().is_none());

        sphere.poll(&mut host).unwrap();
        assert!(sphere.is_deferred());

        host.mount_context(ctx, &SceneConfig::new("late")).unwrap();
        sphere.poll(&mut host).unwrap();
        assert!(!sphere.is_deferred());
        assert!(sphere.root().is_some());
    }

    #[test]
    fn test_deferred_attach_gives_up() {
        let config = crate::core::config::EngineConfig::default().with_attach_retry_budget(3);
        let mut host = SceneHost::new(config, crate::render::RenderDevice::headless()).unwrap();
        let ctx = host.reserve_context();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        sphere.build(&mut host, SphereParams::default()).unwrap();

        sphere.poll(&mut host).unwrap();
        sphere.poll(&mut host).unwrap();
        assert!(matches!(sphere.poll(&mut host), Err(SceneError::ContextUnavailable(_))));
        assert_eq!(sphere.state(), LifecycleState::Disposed);
        assert_eq!(host.device().stats().live_resources(), 0);
    }

    #[test]
    fn test_build_on_destroyed_context() {
        let (mut host, ctx) = host_with_scene();
        host.destroy_context(ctx).unwrap();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);

        assert!(matches!(
            sphere.build(&mut host, SphereParams::default()),
            Err(SceneError::ContextUnavailable(_))
        ));
        assert_eq!(host.device().stats().created, 0);
    }

    #[test]
    fn test_texture_binding_neutralizes_color() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        let params = SphereParams {
            color: [0.2, 0.3, 0.4, 1.0],
            texture_policy: TexturePolicy::NeutralizeColor,
            ..SphereParams::default()
        };
        sphere.build(&mut host, params).unwrap();

        let (pending, resolver) = promise::<TextureData>();
        sphere.bind_texture(pending, "earth").unwrap();
        sphere.poll(&mut host).unwrap();
        assert_eq!(sphere.texture_state(), TextureState::Loading);

        resolver.resolve(TextureData::solid(2, 2, [0, 0, 255, 255]));
        sphere.poll(&mut host).unwrap();
        assert_eq!(sphere.texture_state(), TextureState::Bound);

        let scope = host.scope(ctx).unwrap();
        let node = host.lookup(&scope, sphere.root().unwrap()).unwrap();
        let renderable = node.renderable.as_ref().unwrap();
        assert!(renderable.texture.is_some());
        assert_eq!(renderable.material_state.color, [1.0, 1.0, 1.0, 1.0]);

        let material = renderable.material.unwrap();
        let uploaded = host
            .device()
            .with_backend(|b: &HeadlessBackend| b.material_state(material))
            .flatten();
        assert_eq!(uploaded.map(|s| s.color), Some([1.0, 1.0, 1.0, 1.0]));
        assert_eq!(host.device().stats().live_textures, 1);
    }

    #[test]
    fn test_failed_texture_keeps_material() {
        let (mut host, ctx) = host_with_scene();
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        sphere.build(&mut host, SphereParams::default()).unwrap();

        let (pending, resolver) = promise::<TextureData>();
        sphere.bind_texture(pending, "missing").unwrap();
        drop(resolver);
        sphere.poll(&mut host).unwrap();

        assert_eq!(sphere.texture_state(), TextureState::Failed);
        assert_eq!(host.device().stats().live_textures, 0);
        assert_eq!(host.device().stats().live_resources(), sphere.live_resources());
        assert!(sphere.core.borrow().resources.first_of(ResourceKind::Material).is_some());
    }
}
