//! Headless GPU backend
//!
//! Keeps bookkeeping instead of talking to a driver: live resources by kind,
//! a journal of create and release events, and the last frame submitted to
//! each surface. Used by tests and by the demo application.

use std::collections::HashMap;

use crate::render::backend::{BackendError, BackendResult, DeviceStats, FramePacket, GpuBackend, SurfaceId};
use crate::render::resource::{MaterialState, ResourceDesc, ResourceId, ResourceKind, ResourcePayload};

/// One entry of the backend journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Resource allocated
    Created {
        /// Resource id
        id: ResourceId,
        /// Resource kind
        kind: ResourceKind,
        /// Debug label
        label: String,
    },
    /// Resource released
    Released {
        /// Resource id
        id: ResourceId,
        /// Resource kind
        kind: ResourceKind,
    },
    /// Surface created
    SurfaceCreated(SurfaceId),
    /// Surface released
    SurfaceReleased(SurfaceId),
    /// Frame submitted to a surface
    FrameSubmitted {
        /// Destination surface
        surface: SurfaceId,
        /// Scheduler frame index
        frame_index: u64,
    },
}

#[derive(Debug)]
struct LiveResource {
    kind: ResourceKind,
    bytes: u64,
    material: Option<MaterialState>,
}

/// Backend that records instead of rendering
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    resources: HashMap<ResourceId, LiveResource>,
    surfaces: HashMap<SurfaceId, (u32, u32)>,
    last_frames: HashMap<SurfaceId, FramePacket>,
    journal: Vec<DeviceEvent>,
    memory_budget: Option<u64>,
    bytes_in_use: u64,
    stats: DeviceStats,
}

impl HeadlessBackend {
    /// Create a backend with unlimited memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail allocations once `bytes` of device memory are in use
    #[must_use]
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Create/release history in call order
    pub fn journal(&self) -> &[DeviceEvent] {
        &self.journal
    }

    /// Whether `id` is currently allocated
    pub fn is_live(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    /// Total releases seen
    pub fn release_count(&self) -> u64 {
        self.stats.released
    }

    /// Last frame submitted to `surface`
    pub fn last_frame(&self, surface: SurfaceId) -> Option<&FramePacket> {
        self.last_frames.get(&surface)
    }

    /// Current size of `surface`
    pub fn surface_size(&self, surface: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&surface).copied()
    }

    /// Current uniforms of a material
    pub fn material_state(&self, id: ResourceId) -> Option<MaterialState> {
        self.resources.get(&id).and_then(|r| r.material)
    }

    /// Device memory currently allocated
    pub fn bytes_in_use(&self) -> u64 {
        self.bytes_in_use
    }

    fn count(&mut self, kind: ResourceKind, delta: isize) {
        let slot = match kind {
            ResourceKind::Texture => &mut self.stats.live_textures,
            ResourceKind::Geometry => &mut self.stats.live_geometries,
            ResourceKind::Material => &mut self.stats.live_materials,
            ResourceKind::RenderTarget => &mut self.stats.live_render_targets,
        };
        *slot = slot.saturating_add_signed(delta);
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_resource(&mut self, desc: &ResourceDesc) -> BackendResult<ResourceId> {
        let bytes = desc.byte_size();
        if let Some(budget) = self.memory_budget {
            let available = budget.saturating_sub(self.bytes_in_use);
            if bytes > available {
                return Err(BackendError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }

        self.next_id += 1;
        let id = ResourceId(self.next_id);
        let kind = desc.kind();
        let material = match &desc.payload {
            ResourcePayload::Material(m) => Some(m.state),
            _ => None,
        };

        self.resources.insert(id, LiveResource { kind, bytes, material });
        self.bytes_in_use += bytes;
        self.count(kind, 1);
        self.stats.created += 1;
        self.journal.push(DeviceEvent::Created {
            id,
            kind,
            label: desc.label.clone(),
        });
        Ok(id)
    }

    fn release_resource(&mut self, id: ResourceId) {
        match self.resources.remove(&id) {
            Some(resource) => {
                self.bytes_in_use -= resource.bytes;
                self.count(resource.kind, -1);
                self.stats.released += 1;
                self.journal.push(DeviceEvent::Released { id, kind: resource.kind });
            }
            None => {
                self.stats.double_releases += 1;
                log::error!("Release of {id:?}, which is not live");
            }
        }
    }

    fn update_material(&mut self, id: ResourceId, state: &MaterialState) -> BackendResult<()> {
        let resource = self
            .resources
            .get_mut(&id)
            .filter(|r| r.kind == ResourceKind::Material)
            .ok_or(BackendError::UnknownResource(id))?;
        resource.material = Some(*state);
        self.stats.material_updates += 1;
        Ok(())
    }

    fn create_surface(&mut self, width: u32, height: u32) -> BackendResult<SurfaceId> {
        self.next_id += 1;
        let surface = SurfaceId(self.next_id);
        self.surfaces.insert(surface, (width, height));
        self.stats.live_surfaces += 1;
        self.journal.push(DeviceEvent::SurfaceCreated(surface));
        Ok(surface)
    }

    fn resize_surface(&mut self, surface: SurfaceId, width: u32, height: u32) -> BackendResult<()> {
        let size = self
            .surfaces
            .get_mut(&surface)
            .ok_or(BackendError::UnknownSurface(surface))?;
        *size = (width, height);
        Ok(())
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_some() {
            self.stats.live_surfaces -= 1;
            self.last_frames.remove(&surface);
            self.journal.push(DeviceEvent::SurfaceReleased(surface));
        } else {
            log::error!("Release of surface {surface:?}, which is not live");
        }
    }

    fn submit_frame(&mut self, packet: &FramePacket) -> BackendResult<()> {
        if !self.surfaces.contains_key(&packet.surface) {
            return Err(BackendError::UnknownSurface(packet.surface));
        }
        let stale = packet
            .draws
            .iter()
            .filter_map(|d| d.geometry)
            .find(|g| !self.resources.contains_key(g));
        if let Some(id) = stale {
            return Err(BackendError::UnknownResource(id));
        }

        self.stats.frames_submitted += 1;
        self.journal.push(DeviceEvent::FrameSubmitted {
            surface: packet.surface,
            frame_index: packet.frame_index,
        });
        self.last_frames.insert(packet.surface, packet.clone());
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        self.stats
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_release_is_counted() {
        let mut backend = HeadlessBackend::new();
        let id = backend
            .create_resource(&ResourceDesc::texture("t", 1, 1, vec![0; 4]))
            .unwrap();
        backend.release_resource(id);
        backend.release_resource(id);

        let stats = backend.stats();
        assert_eq!(stats.released, 1);
        assert_eq!(stats.double_releases, 1);
        assert_eq!(stats.live_textures, 0);
    }

    #[test]
    fn test_memory_budget() {
        let mut backend = HeadlessBackend::new().with_memory_budget(100);
        let first = backend.create_resource(&ResourceDesc::texture("a", 4, 4, vec![0; 64]));
        assert!(first.is_ok());

        let second = backend.create_resource(&ResourceDesc::texture("b", 4, 4, vec![0; 64]));
        assert_eq!(
            second,
            Err(BackendError::OutOfMemory {
                requested: 64,
                available: 36
            })
        );

        backend.release_resource(first.unwrap());
        assert_eq!(backend.bytes_in_use(), 0);
    }

    #[test]
    fn test_surface_lifecycle() {
        let mut backend = HeadlessBackend::new();
        let surface = backend.create_surface(640, 480).unwrap();
        backend.resize_surface(surface, 320, 240).unwrap();
        assert_eq!(backend.surface_size(surface), Some((320, 240)));

        backend.release_surface(surface);
        assert_eq!(backend.stats().live_surfaces, 0);
        assert_eq!(
            backend.resize_surface(surface, 1, 1),
            Err(BackendError::UnknownSurface(surface))
        );
    }
}
