//! Presentation surface owned by one scene context

use crate::render::backend::{BackendResult, SurfaceId};
use crate::render::device::RenderDevice;

/// Render surface with its current pixel size
#[derive(Debug)]
pub struct RenderSurface {
    id: SurfaceId,
    width: u32,
    height: u32,
    device: RenderDevice,
    released: bool,
}

impl RenderSurface {
    /// Create a surface on `device`
    pub fn new(device: &RenderDevice, width: u32, height: u32) -> BackendResult<Self> {
        let id = device.create_surface(width, height)?;
        Ok(Self {
            id,
            width,
            height,
            device: device.clone(),
            released: false,
        })
    }

    /// Backend id
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Whether the backend surface is gone
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Resize the backend surface
    pub fn resize(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.device.resize_surface(self.id, width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Release the backend surface; later calls are no-ops
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.device.release_surface(self.id);
        }
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_once() {
        let device = RenderDevice::headless();
        let mut surface = RenderSurface::new(&device, 800, 600).unwrap();
        assert_eq!(device.stats().live_surfaces, 1);

        surface.release();
        surface.release();
        drop(surface);
        assert_eq!(device.stats().live_surfaces, 0);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let device = RenderDevice::headless();
        let mut surface = RenderSurface::new(&device, 800, 600).unwrap();
        surface.resize(1600, 800).unwrap();
        assert_eq!(surface.size(), (1600, 800));
        assert!((surface.aspect() - 2.0).abs() < f32::EPSILON);
    }
}
