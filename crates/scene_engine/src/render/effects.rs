//! Post-render effect pipeline
//!
//! Each scene context owns one [`EffectPipeline`]: an ordered chain of
//! [`EffectPass`] implementations. Passes declare their parameters with a
//! valid range; every write is clamped to that range before it can reach the
//! backend.

use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::{ContextId, PassId, PassKey, SlotMap};
use crate::render::backend::{BackendResult, PassRecord};
use crate::render::device::RenderDevice;
use crate::render::resource::ResourceId;

/// Declared parameter of an effect pass
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Smallest accepted value
    pub min: f32,
    /// Largest accepted value
    pub max: f32,
    /// Value used initially and for NaN input
    pub default: f32,
    /// Human readable description
    pub description: &'static str,
}

impl ParamSpec {
    /// Unbounded parameter with a default
    pub fn new(name: &'static str, default: f32) -> Self {
        Self {
            name,
            min: f32::MIN,
            max: f32::MAX,
            default,
            description: "",
        }
    }

    /// Restrict the valid range; inverted bounds are swapped
    #[must_use]
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        if min > max {
            log::warn!("Parameter '{}' range [{}, {}] is inverted, swapping", self.name, min, max);
        }
        self.min = min.min(max);
        self.max = max.max(min);
        self
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Bring `value` into range, warning when it had to be changed
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            log::warn!("Parameter '{}' got NaN, using default {}", self.name, self.default);
            return self.default;
        }
        // Bounds are public fields, so order them here too
        let (lo, hi) = (self.min.min(self.max), self.max.max(self.min));
        let clamped = value.max(lo).min(hi);
        if clamped != value {
            log::warn!(
                "Parameter '{}' value {} outside [{}, {}], clamped to {}",
                self.name,
                value,
                lo,
                hi,
                clamped
            );
        }
        clamped
    }
}

/// Current values of a pass's declared parameters
#[derive(Debug, Clone)]
pub struct PassParameters {
    specs: Vec<ParamSpec>,
    values: Vec<f32>,
}

impl PassParameters {
    /// Start every parameter at its default
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        let values = specs.iter().map(|s| s.default).collect();
        Self { specs, values }
    }

    /// Declared parameters
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// Current value of `name`
    pub fn get(&self, name: &str) -> Option<f32> {
        self.index_of(name).map(|i| self.values[i])
    }

    /// Clamp and store `value`, returning what was stored
    pub fn set(&mut self, name: &str, value: f32) -> Option<f32> {
        let index = self.index_of(name)?;
        let clamped = self.specs[index].clamp(value);
        self.values[index] = clamped;
        Some(clamped)
    }

    /// Name and value pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.specs.iter().map(|s| s.name).zip(self.values.iter().copied())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }
}

/// One post-render pass
///
/// Passes only carry parameters and offscreen targets; the effect algorithms
/// live in the backend.
pub trait EffectPass {
    /// Label used in logs and frame packets
    fn label(&self) -> &str;

    /// Declared parameters and their values
    fn parameters(&self) -> &PassParameters;

    /// Mutable parameters
    fn parameters_mut(&mut self) -> &mut PassParameters;

    /// React to a surface resize
    fn resize(&mut self, _device: &RenderDevice, _width: u32, _height: u32) -> BackendResult<()> {
        Ok(())
    }

    /// Offscreen target the pass writes to
    fn target(&self) -> Option<ResourceId> {
        None
    }

    /// Release offscreen targets
    fn release(&mut self) {}

    /// Snapshot of the pass for a frame packet
    fn record(&self, size: (u32, u32)) -> PassRecord {
        PassRecord {
            label: self.label().to_string(),
            parameters: self
                .parameters()
                .iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            target: self.target(),
            size,
        }
    }
}

/// Ordered chain of passes for one context
pub struct EffectPipeline {
    context: ContextId,
    device: RenderDevice,
    passes: SlotMap<PassKey, Box<dyn EffectPass>>,
    order: Vec<PassKey>,
    size: (u32, u32),
}

impl EffectPipeline {
    /// Empty pipeline rendering at `size`
    pub fn new(context: ContextId, device: RenderDevice, size: (u32, u32)) -> Self {
        Self {
            context,
            device,
            passes: SlotMap::with_key(),
            order: Vec::new(),
            size,
        }
    }

    /// Number of passes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the pipeline has no passes
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current render size
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Pass ids in execution order
    pub fn pass_ids(&self) -> Vec<PassId> {
        self.order
            .iter()
            .map(|&key| PassId::new(self.context, key))
            .collect()
    }

    /// Insert a pass at `index` (appended when `None` or past the end)
    pub fn add_pass(&mut self, mut pass: Box<dyn EffectPass>, index: Option<usize>) -> SceneResult<PassId> {
        let (width, height) = self.size;
        pass.resize(&self.device, width, height)?;

        log::debug!("Adding effect pass '{}' to context {:?}", pass.label(), self.context);
        let key = self.passes.insert(pass);
        let at = index.map_or(self.order.len(), |i| i.min(self.order.len()));
        self.order.insert(at, key);
        Ok(PassId::new(self.context, key))
    }

    /// Remove a pass and release its targets
    pub fn remove_pass(&mut self, id: PassId) -> SceneResult<()> {
        let key = self.key_of(id)?;
        let mut pass = self.passes.remove(key).ok_or(SceneError::NotFound { kind: "effect pass" })?;
        self.order.retain(|&k| k != key);
        log::debug!("Removed effect pass '{}' from context {:?}", pass.label(), self.context);
        pass.release();
        Ok(())
    }

    /// Propagate a resize to every pass
    pub fn resize(&mut self, width: u32, height: u32) -> SceneResult<()> {
        self.size = (width, height);
        for key in &self.order {
            if let Some(pass) = self.passes.get_mut(*key) {
                pass.resize(&self.device, width, height)?;
            }
        }
        Ok(())
    }

    /// Write a parameter, returning the clamped value that was applied
    pub fn set_parameter(&mut self, id: PassId, name: &str, value: f32) -> SceneResult<f32> {
        let key = self.key_of(id)?;
        let pass = self
            .passes
            .get_mut(key)
            .ok_or(SceneError::NotFound { kind: "effect pass" })?;
        pass.parameters_mut()
            .set(name, value)
            .ok_or_else(|| SceneError::UnknownParameter {
                pass: id,
                name: name.to_string(),
            })
    }

    /// Read a parameter
    pub fn parameter(&self, id: PassId, name: &str) -> SceneResult<f32> {
        let key = self.key_of(id)?;
        let pass = self
            .passes
            .get(key)
            .ok_or(SceneError::NotFound { kind: "effect pass" })?;
        pass.parameters().get(name).ok_or_else(|| SceneError::UnknownParameter {
            pass: id,
            name: name.to_string(),
        })
    }

    /// Offscreen target of a pass
    pub fn target(&self, id: PassId) -> SceneResult<Option<ResourceId>> {
        let key = self.key_of(id)?;
        self.passes
            .get(key)
            .map(|p| p.target())
            .ok_or(SceneError::NotFound { kind: "effect pass" })
    }

    /// Records of every pass in order
    pub fn record(&self) -> Vec<PassRecord> {
        self.order
            .iter()
            .filter_map(|key| self.passes.get(*key))
            .map(|pass| pass.record(self.size))
            .collect()
    }

    /// Release every pass
    pub fn teardown(&mut self) {
        for key in self.order.drain(..) {
            if let Some(mut pass) = self.passes.remove(key) {
                pass.release();
            }
        }
        self.passes.clear();
    }

    fn key_of(&self, id: PassId) -> SceneResult<PassKey> {
        if id.context() != self.context {
            return Err(SceneError::ScopeViolation {
                caller: self.context,
                target: id.context(),
            });
        }
        Ok(id.key())
    }
}

impl std::fmt::Debug for EffectPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self
            .order
            .iter()
            .filter_map(|k| self.passes.get(*k))
            .map(|p| p.label())
            .collect();
        f.debug_struct("EffectPipeline")
            .field("context", &self.context)
            .field("passes", &labels)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::ContextIds;
    use crate::render::passes::{BloomPass, ExposurePass, VignettePass};

    fn pipeline_in(contexts: &mut ContextIds) -> (EffectPipeline, RenderDevice) {
        let device = RenderDevice::headless();
        (EffectPipeline::new(contexts.mint(), device.clone(), (800, 600)), device)
    }

    fn pipeline() -> (EffectPipeline, RenderDevice) {
        pipeline_in(&mut ContextIds::new())
    }

    #[test]
    fn test_param_clamp() {
        let spec = ParamSpec::new("threshold", 0.9).with_range(0.0, 1.0);
        assert_eq!(spec.clamp(1.7), 1.0);
        assert_eq!(spec.clamp(-3.0), 0.0);
        assert_eq!(spec.clamp(0.5), 0.5);
        assert_eq!(spec.clamp(f32::NAN), 0.9);
        assert_eq!(spec.clamp(f32::INFINITY), 1.0);
    }

    #[test]
    fn test_inverted_range_is_swapped() {
        let spec = ParamSpec::new("x", 0.0).with_range(1.0, 0.0);
        assert_eq!((spec.min, spec.max), (0.0, 1.0));
        assert_eq!(spec.clamp(0.5), 0.5);
        assert_eq!(spec.clamp(2.0), 1.0);

        let mut raw = ParamSpec::new("y", 0.0);
        raw.min = 3.0;
        raw.max = -3.0;
        assert_eq!(raw.clamp(5.0), 3.0);
        assert_eq!(raw.clamp(-5.0), -3.0);
    }

    #[test]
    fn test_insert_at_index() {
        let (mut effects, _device) = pipeline();
        let bloom = effects.add_pass(Box::new(BloomPass::new()), None).unwrap();
        let vignette = effects.add_pass(Box::new(VignettePass::new()), None).unwrap();
        let exposure = effects.add_pass(Box::new(ExposurePass::new()), Some(0)).unwrap();

        assert_eq!(effects.pass_ids(), vec![exposure, bloom, vignette]);
        let labels: Vec<String> = effects.record().into_iter().map(|r| r.label).collect();
        assert_eq!(labels, ["exposure", "bloom", "vignette"]);
    }

    #[test]
    fn test_set_parameter_is_clamped() {
        let (mut effects, _device) = pipeline();
        let bloom = effects.add_pass(Box::new(BloomPass::new()), None).unwrap();

        assert_eq!(effects.set_parameter(bloom, "threshold", 4.2).unwrap(), 1.0);
        assert_eq!(effects.parameter(bloom, "threshold").unwrap(), 1.0);
        assert!(matches!(
            effects.set_parameter(bloom, "gamma", 2.2),
            Err(SceneError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_foreign_pass_id_rejected() {
        let mut contexts = ContextIds::new();
        let (mut first, _) = pipeline_in(&mut contexts);
        let (mut second, _) = pipeline_in(&mut contexts);
        let id = first.add_pass(Box::new(VignettePass::new()), None).unwrap();
        second.add_pass(Box::new(VignettePass::new()), None).unwrap();

        assert!(matches!(
            second.set_parameter(id, "darkness", 1.0),
            Err(SceneError::ScopeViolation { .. })
        ));
        assert!(matches!(second.remove_pass(id), Err(SceneError::ScopeViolation { .. })));
    }

    #[test]
    fn test_remove_and_teardown_release_targets() {
        let (mut effects, device) = pipeline();
        let bloom = effects.add_pass(Box::new(BloomPass::new()), None).unwrap();
        effects.add_pass(Box::new(BloomPass::new()), None).unwrap();
        assert_eq!(device.stats().live_render_targets, 2);

        effects.remove_pass(bloom).unwrap();
        assert_eq!(device.stats().live_render_targets, 1);
        assert!(matches!(effects.remove_pass(bloom), Err(SceneError::NotFound { .. })));

        effects.teardown();
        assert!(effects.is_empty());
        assert_eq!(device.stats().live_render_targets, 0);
        assert_eq!(device.stats().double_releases, 0);
    }
}
