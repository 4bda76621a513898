//! Scene node representation
//!
//! A node is graph metadata only. It references GPU resources by id but never
//! owns them; the controller that registered the node owns the handles.

use crate::foundation::collections::{ControllerId, NodeId};
use crate::foundation::math::Transform;
use crate::render::{MaterialState, ResourceId};

/// Resources a node draws with, plus its animated uniforms
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    /// Geometry buffer
    pub geometry: Option<ResourceId>,
    /// Material
    pub material: Option<ResourceId>,
    /// Bound texture
    pub texture: Option<ResourceId>,
    /// Uniforms mutated by frame callbacks
    pub material_state: MaterialState,
}

/// Node in one context's scene graph
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Label for logs
    pub label: String,

    /// Parent node; lookup only, never implies lifetime
    pub(crate) parent: Option<NodeId>,

    /// Children in insertion order
    pub(crate) children: Vec<NodeId>,

    /// Local transform relative to the parent
    pub transform: Transform,

    /// Hidden nodes hide their whole subtree
    pub visible: bool,

    /// Controller that registered this node
    pub owner: Option<ControllerId>,

    /// Draw data, if the node renders anything
    pub renderable: Option<Renderable>,
}

impl SceneNode {
    /// Visible node with identity transform
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform::identity(),
            visible: true,
            owner: None,
            renderable: None,
        }
    }

    /// Set the local transform
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attach draw data
    #[must_use]
    pub fn with_renderable(mut self, renderable: Renderable) -> Self {
        self.renderable = Some(renderable);
        self
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Current material uniforms, if renderable
    pub fn material_state(&self) -> Option<&MaterialState> {
        self.renderable.as_ref().map(|r| &r.material_state)
    }

    /// Mutable material uniforms, if renderable
    pub fn material_state_mut(&mut self) -> Option<&mut MaterialState> {
        self.renderable.as_mut().map(|r| &mut r.material_state)
    }
}
