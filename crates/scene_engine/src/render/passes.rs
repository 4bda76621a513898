//! Built-in effect passes
//!
//! Parameter declarations and offscreen targets only. The backend owns the
//! shaders that consume them.

use crate::render::backend::BackendResult;
use crate::render::device::RenderDevice;
use crate::render::effects::{EffectPass, ParamSpec, PassParameters};
use crate::render::resource::{ResourceDesc, ResourceHandle, ResourceId, TextureFormat};

/// Bright-pass bloom rendered into a half-resolution HDR target
#[derive(Debug)]
pub struct BloomPass {
    params: PassParameters,
    target: Option<ResourceHandle>,
}

impl BloomPass {
    /// Bloom with default threshold, strength and radius
    pub fn new() -> Self {
        Self {
            params: PassParameters::new(vec![
                ParamSpec::new("threshold", 0.9)
                    .with_range(0.0, 1.0)
                    .with_description("Luminance above which pixels bloom"),
                ParamSpec::new("strength", 1.0)
                    .with_range(0.0, 3.0)
                    .with_description("Bloom intensity"),
                ParamSpec::new("radius", 0.4)
                    .with_range(0.0, 1.0)
                    .with_description("Blur spread"),
            ]),
            target: None,
        }
    }

    /// Size of the bloom target for a surface of `width` x `height`
    pub fn target_size(width: u32, height: u32) -> (u32, u32) {
        ((width / 2).max(1), (height / 2).max(1))
    }
}

impl Default for BloomPass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for BloomPass {
    fn label(&self) -> &str {
        "bloom"
    }

    fn parameters(&self) -> &PassParameters {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut PassParameters {
        &mut self.params
    }

    fn resize(&mut self, device: &RenderDevice, width: u32, height: u32) -> BackendResult<()> {
        // Old target goes back to the device before the new one is allocated
        if let Some(old) = self.target.take() {
            old.dispose();
        }
        let (w, h) = Self::target_size(width, height);
        let desc = ResourceDesc::render_target("bloom-target", w, h, TextureFormat::Rgba16F);
        self.target = Some(device.allocate(&desc)?);
        Ok(())
    }

    fn target(&self) -> Option<ResourceId> {
        self.target.as_ref().map(ResourceHandle::id)
    }

    fn release(&mut self) {
        if let Some(target) = self.target.take() {
            target.dispose();
        }
    }
}

/// Screen-edge darkening
#[derive(Debug)]
pub struct VignettePass {
    params: PassParameters,
}

impl VignettePass {
    /// Vignette with default offset and darkness
    pub fn new() -> Self {
        Self {
            params: PassParameters::new(vec![
                ParamSpec::new("offset", 1.0).with_range(0.0, 2.0),
                ParamSpec::new("darkness", 1.0).with_range(0.0, 2.0),
            ]),
        }
    }
}

impl Default for VignettePass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for VignettePass {
    fn label(&self) -> &str {
        "vignette"
    }

    fn parameters(&self) -> &PassParameters {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut PassParameters {
        &mut self.params
    }
}

/// Tone-mapping exposure
#[derive(Debug)]
pub struct ExposurePass {
    params: PassParameters,
}

impl ExposurePass {
    /// Exposure of 1.0
    pub fn new() -> Self {
        Self {
            params: PassParameters::new(vec![ParamSpec::new("exposure", 1.0)
                .with_range(0.01, 16.0)
                .with_description("Linear exposure multiplier")]),
        }
    }
}

impl Default for ExposurePass {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectPass for ExposurePass {
    fn label(&self) -> &str {
        "exposure"
    }

    fn parameters(&self) -> &PassParameters {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut PassParameters {
        &mut self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{DeviceEvent, HeadlessBackend};

    #[test]
    fn test_bloom_resize_disposes_before_allocating() {
        let device = RenderDevice::headless();
        let mut bloom = BloomPass::new();
        bloom.resize(&device, 800, 600).unwrap();
        let first = bloom.target().unwrap();

        bloom.resize(&device, 1024, 768).unwrap();
        let second = bloom.target().unwrap();
        assert_ne!(first, second);
        assert_eq!(device.stats().live_render_targets, 1);

        let order = device
            .with_backend(|b: &HeadlessBackend| {
                let released = b
                    .journal()
                    .iter()
                    .position(|e| matches!(e, DeviceEvent::Released { id, .. } if *id == first));
                let created = b
                    .journal()
                    .iter()
                    .position(|e| matches!(e, DeviceEvent::Created { id, .. } if *id == second));
                (released, created)
            })
            .unwrap();
        assert!(order.0.unwrap() < order.1.unwrap());
    }

    #[test]
    fn test_bloom_target_is_half_resolution() {
        assert_eq!(BloomPass::target_size(800, 600), (400, 300));
        assert_eq!(BloomPass::target_size(1, 1), (1, 1));
    }

    #[test]
    fn test_record_lists_parameters() {
        let mut vignette = VignettePass::new();
        vignette.parameters_mut().set("darkness", 5.0);
        let record = vignette.record((10, 10));
        assert_eq!(
            record.parameters,
            vec![("offset".to_string(), 1.0), ("darkness".to_string(), 2.0)]
        );
        assert_eq!(record.target, None);
    }
}
