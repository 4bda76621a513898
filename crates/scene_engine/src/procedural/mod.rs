//! # Procedural Resource Builders
//!
//! A builder maps a declarative parameter record to a [`Blueprint`]: the
//! resource descriptions it needs plus the node template that binds them.
//! Builders never see a scene context. The controller materializes the
//! blueprint on a device and registers the node.
//!
//! ```text
//! Params ──describe──▶ Blueprint ──materialize──▶ ResourceSet
//!                          │
//!                          └── NodeTemplate ──instantiate──▶ SceneNode
//! ```

pub mod glow;
pub mod ring;
pub mod sphere;

pub use glow::{GlowParams, GlowPulse, GlowSpriteBuilder};
pub use ring::{RingBuilder, RingParams};
pub use sphere::{Spin, SphereBuilder, SphereParams};

use std::f32::consts::TAU;
use std::fmt::Debug;

use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::ControllerId;
use crate::foundation::math::{utils, Transform, Vec3};
use crate::render::{MaterialState, RenderDevice, ResourceDesc, ResourceSet};
use crate::scene::node::{Renderable, SceneNode};

/// Pure mapping from parameters to a blueprint
pub trait ProceduralBuilder {
    /// Declarative parameter record
    type Params: Clone + Debug;

    /// Builder name for labels and logs
    fn name(&self) -> &'static str;

    /// Describe the resources and node for `params`
    ///
    /// Identical parameters give identical blueprints. Out-of-domain input
    /// fails with [`SceneError::InvalidParameter`].
    fn describe(&self, params: &Self::Params) -> SceneResult<Blueprint>;

    /// Blueprint used when `describe` rejects the parameters
    fn fallback(&self) -> Blueprint {
        Blueprint::empty(self.name())
    }
}

/// How a bound texture interacts with the caller's material color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TexturePolicy {
    /// Keep the caller's color; the texture is tinted by it
    #[default]
    PreserveColor,
    /// Reset the color to white so the texture shows unmodified
    NeutralizeColor,
}

impl TexturePolicy {
    /// Apply the policy to material uniforms once a texture is bound
    pub fn apply(self, state: &mut MaterialState) {
        if self == Self::NeutralizeColor {
            state.color = [1.0, 1.0, 1.0, state.color[3]];
        }
    }
}

/// Indices into the blueprint's resource list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bindings {
    /// Geometry resource
    pub geometry: Option<usize>,
    /// Material resource
    pub material: Option<usize>,
    /// Texture resource
    pub texture: Option<usize>,
}

/// Node to register once the resources exist
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    /// Node label
    pub label: String,
    /// Local transform
    pub transform: Transform,
    /// Visibility flag
    pub visible: bool,
    /// Resource bindings
    pub binds: Bindings,
    /// Initial material uniforms
    pub material_state: MaterialState,
    /// Texture/color interaction
    pub texture_policy: TexturePolicy,
    /// Child templates
    pub children: Vec<NodeTemplate>,
}

impl NodeTemplate {
    /// Visible template with identity transform and no bindings
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            transform: Transform::identity(),
            visible: true,
            binds: Bindings::default(),
            material_state: MaterialState::default(),
            texture_policy: TexturePolicy::default(),
            children: Vec::new(),
        }
    }

    /// Set the transform
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the resource bindings
    #[must_use]
    pub fn with_bindings(mut self, binds: Bindings) -> Self {
        self.binds = binds;
        self
    }

    /// Set the material uniforms
    #[must_use]
    pub fn with_material_state(mut self, state: MaterialState) -> Self {
        self.material_state = state;
        self
    }

    /// Set the texture policy
    #[must_use]
    pub fn with_texture_policy(mut self, policy: TexturePolicy) -> Self {
        self.texture_policy = policy;
        self
    }

    /// Append a child
    #[must_use]
    pub fn with_child(mut self, child: NodeTemplate) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this template, itself included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Scene node bound to the materialized resources (children not included)
    pub fn instantiate(&self, resources: &ResourceSet, owner: Option<ControllerId>) -> SceneNode {
        let lookup = |index: Option<usize>| index.and_then(|i| resources.id_at(i));
        let renderable = Renderable {
            geometry: lookup(self.binds.geometry),
            material: lookup(self.binds.material),
            texture: lookup(self.binds.texture),
            material_state: self.material_state,
        };

        let mut node = SceneNode::new(self.label.clone()).with_transform(self.transform.clone());
        node.visible = self.visible;
        node.owner = owner;
        if renderable.geometry.is_some() || renderable.material.is_some() || renderable.texture.is_some() {
            node.renderable = Some(renderable);
        }
        node
    }
}

/// Per-frame animation driven by the controller's frame callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Animation {
    /// Constant rotation
    Spin {
        /// Rotation axis
        axis: Vec3,
        /// Angular speed
        radians_per_second: f32,
    },
    /// Sinusoidal opacity
    Pulse {
        /// Cycles per second
        frequency_hz: f32,
        /// Opacity at the trough
        min_opacity: f32,
        /// Opacity at the crest
        max_opacity: f32,
    },
}

impl Animation {
    /// Advance `node` to scene time `elapsed`
    pub fn apply(&self, node: &mut SceneNode, elapsed: f64, delta: f32) {
        match *self {
            Self::Spin {
                axis,
                radians_per_second,
            } => node.transform.rotate_about(axis, radians_per_second * delta),
            Self::Pulse {
                frequency_hz,
                min_opacity,
                max_opacity,
            } => {
                if let Some(renderable) = node.renderable.as_mut() {
                    let phase = (f64::from(TAU) * f64::from(frequency_hz) * elapsed).sin() as f32;
                    renderable.material_state.opacity =
                        utils::lerp(min_opacity, max_opacity, 0.5 + 0.5 * phase);
                }
            }
        }
    }
}

/// Everything a builder wants created for one primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    /// Resources in allocation order
    pub resources: Vec<ResourceDesc>,
    /// Node bound to those resources
    pub node: NodeTemplate,
    /// Animation applied each tick
    pub animation: Option<Animation>,
}

impl Blueprint {
    /// No resources, an unbound node and no animation
    pub fn empty(label: &str) -> Self {
        Self {
            resources: Vec::new(),
            node: NodeTemplate::new(format!("{label}-fallback")),
            animation: None,
        }
    }

    /// Number of handles `materialize` produces
    pub fn handle_count(&self) -> usize {
        self.resources.len()
    }

    /// Allocate every resource in order
    ///
    /// On failure every handle allocated so far is disposed before returning.
    pub fn materialize(&self, device: &RenderDevice) -> SceneResult<ResourceSet> {
        let mut set = ResourceSet::new();
        for desc in &self.resources {
            match device.allocate(desc) {
                Ok(handle) => set.push(handle),
                Err(err) => {
                    let disposed = set.dispose_all();
                    log::warn!(
                        "Allocation of '{}' failed ({err}); disposed {disposed} partial handles",
                        desc.label
                    );
                    return Err(err.into());
                }
            }
        }
        Ok(set)
    }
}

/// Finite and strictly positive
pub fn require_positive(name: &'static str, value: f32) -> SceneResult<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SceneError::invalid_parameter(name, format!("must be positive, got {value}")))
    }
}

/// Finite and within `[min, max]`
pub fn require_range(name: &'static str, value: f32, min: f32, max: f32) -> SceneResult<f32> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SceneError::invalid_parameter(
            name,
            format!("must be within [{min}, {max}], got {value}"),
        ))
    }
}

/// Integer lower bound
pub fn require_at_least(name: &'static str, value: u32, min: u32) -> SceneResult<u32> {
    if value >= min {
        Ok(value)
    } else {
        Err(SceneError::invalid_parameter(name, format!("must be at least {min}, got {value}")))
    }
}

/// Integer within `[min, max]`
pub fn require_between(name: &'static str, value: u32, min: u32, max: u32) -> SceneResult<u32> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SceneError::invalid_parameter(
            name,
            format!("must be within [{min}, {max}], got {value}"),
        ))
    }
}

/// Every channel finite and non-negative
pub fn require_color(name: &'static str, color: [f32; 4]) -> SceneResult<[f32; 4]> {
    if color.iter().all(|c| c.is_finite() && *c >= 0.0) {
        Ok(color)
    } else {
        Err(SceneError::invalid_parameter(name, format!("invalid color {color:?}")))
    }
}
