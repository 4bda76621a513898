//! Shared handle over the active GPU backend
//!
//! Every allocation and release in the engine goes through a [`RenderDevice`].
//! Clones share one backend. Releases that arrive while the backend is already
//! borrowed (a handle dropped from inside a backend inspection closure) are
//! queued and flushed on the next device call.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::render::backend::{BackendError, BackendResult, DeviceStats, FramePacket, GpuBackend, SurfaceId};
use crate::render::headless::HeadlessBackend;
use crate::render::resource::{MaterialState, ResourceDesc, ResourceHandle, ResourceId};

/// Cloneable handle over one backend
#[derive(Clone)]
pub struct RenderDevice {
    backend: Rc<RefCell<Box<dyn GpuBackend>>>,
    deferred: Rc<RefCell<Vec<ResourceId>>>,
}

impl RenderDevice {
    /// Wrap a backend
    pub fn new(backend: Box<dyn GpuBackend>) -> Self {
        log::info!("Render device created on backend '{}'", backend.name());
        Self {
            backend: Rc::new(RefCell::new(backend)),
            deferred: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Device over a fresh [`HeadlessBackend`]
    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessBackend::new()))
    }

    fn backend_mut(&self) -> BackendResult<RefMut<'_, Box<dyn GpuBackend>>> {
        let mut backend = self
            .backend
            .try_borrow_mut()
            .map_err(|_| BackendError::Other("backend is busy".to_string()))?;
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        for id in pending {
            backend.release_resource(id);
        }
        Ok(backend)
    }

    /// Allocate a resource and wrap it in its owning handle
    pub fn allocate(&self, desc: &ResourceDesc) -> BackendResult<ResourceHandle> {
        let id = self.backend_mut()?.create_resource(desc)?;
        log::trace!("Allocated {:?} '{}' as {:?}", desc.kind(), desc.label, id);
        Ok(ResourceHandle::new(id, desc.kind(), desc.label.clone(), self.clone()))
    }

    /// Release a resource; called by [`ResourceHandle::dispose`]
    pub(crate) fn release(&self, id: ResourceId) {
        match self.backend_mut() {
            Ok(mut backend) => backend.release_resource(id),
            Err(_) => self.deferred.borrow_mut().push(id),
        }
    }

    /// Upload material uniforms
    pub fn update_material(&self, id: ResourceId, state: &MaterialState) -> BackendResult<()> {
        self.backend_mut()?.update_material(id, state)
    }

    /// Create a presentation surface
    pub fn create_surface(&self, width: u32, height: u32) -> BackendResult<SurfaceId> {
        self.backend_mut()?.create_surface(width, height)
    }

    /// Resize a presentation surface
    pub fn resize_surface(&self, surface: SurfaceId, width: u32, height: u32) -> BackendResult<()> {
        self.backend_mut()?.resize_surface(surface, width, height)
    }

    /// Release a presentation surface
    pub fn release_surface(&self, surface: SurfaceId) {
        match self.backend_mut() {
            Ok(mut backend) => backend.release_surface(surface),
            Err(err) => log::error!("Could not release surface {surface:?}: {err}"),
        }
    }

    /// Submit one frame
    pub fn submit_frame(&self, packet: &FramePacket) -> BackendResult<()> {
        self.backend_mut()?.submit_frame(packet)
    }

    /// Allocation counters, after flushing deferred releases
    pub fn stats(&self) -> DeviceStats {
        match self.backend_mut() {
            Ok(backend) => backend.stats(),
            Err(_) => self.backend.try_borrow().map(|b| b.stats()).unwrap_or_default(),
        }
    }

    /// Inspect the concrete backend, if it is a `T`
    pub fn with_backend<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        drop(self.backend_mut().ok());
        let backend = self.backend.try_borrow().ok()?;
        backend.as_any().downcast_ref::<T>().map(f)
    }

    /// Name reported by the backend
    pub fn backend_name(&self) -> String {
        self.backend
            .try_borrow()
            .map_or_else(|_| "<busy>".to_string(), |b| b.name().to_string())
    }

    /// Whether both handles share one backend
    pub fn same_device(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.backend, &other.backend)
    }
}

impl fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderDevice")
            .field("backend", &self.backend_name())
            .finish()
    }
}
