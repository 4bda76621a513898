//! Scene graph registry
//!
//! Per-context arena of nodes forming a single tree under an implicit root.
//! Removing a node detaches its subtree from bookkeeping; resource lifetime is
//! the owning controller's business.

use crate::error::{ParentRejection, SceneError, SceneResult};
use crate::foundation::collections::{ContextId, NodeId, NodeKey, SlotMap};
use crate::foundation::math::{Mat4, Transform};
use crate::render::DrawItem;
use crate::scene::node::SceneNode;
use crate::scene::scope::ContextScope;

/// Node arena of one context
#[derive(Debug)]
pub struct SceneRegistry {
    context: ContextId,
    nodes: SlotMap<NodeKey, SceneNode>,
    root: NodeKey,
}

impl SceneRegistry {
    /// Empty registry holding only the root
    pub fn new(context: ContextId) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("root"));
        Self { context, nodes, root }
    }

    /// Owning context
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Root node id
    pub fn root(&self) -> NodeId {
        NodeId::new(self.context, self.root)
    }

    /// Registered nodes, root excluded
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether only the root is present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` belongs to this context and is registered
    pub fn contains(&self, id: NodeId) -> bool {
        id.context() == self.context && self.nodes.contains_key(id.key())
    }

    /// Register `node` under `parent`, or under the root when `None`
    pub fn register(
        &mut self,
        scope: &ContextScope,
        mut node: SceneNode,
        parent: Option<NodeId>,
    ) -> SceneResult<NodeId> {
        self.check_scope(scope)?;
        let parent_key = match parent {
            None => self.root,
            Some(parent) => self.parent_key(None, parent)?,
        };

        node.parent = Some(NodeId::new(self.context, parent_key));
        node.children.clear();
        let key = self.nodes.insert(node);
        let id = NodeId::new(self.context, key);
        if let Some(parent) = self.nodes.get_mut(parent_key) {
            parent.children.push(id);
        }
        log::trace!("Registered node {:?} in context {:?}", id, self.context);
        Ok(id)
    }

    /// Move `id` under `parent`, or under the root when `None`
    ///
    /// The graph is unchanged when the move is rejected.
    pub fn reparent(&mut self, scope: &ContextScope, id: NodeId, parent: Option<NodeId>) -> SceneResult<()> {
        self.check_scope(scope)?;
        let key = self.resolve(id)?;
        if key == self.root {
            return Err(SceneError::RootNode);
        }

        let new_parent = match parent {
            None => self.root,
            Some(parent) => {
                let parent_key = self.parent_key(Some(id), parent)?;
                if parent_key == key {
                    return Err(SceneError::InvalidParent {
                        node: Some(id),
                        parent,
                        reason: ParentRejection::SelfParent,
                    });
                }
                if self.is_ancestor(key, parent_key) {
                    return Err(SceneError::InvalidParent {
                        node: Some(id),
                        parent,
                        reason: ParentRejection::Cycle,
                    });
                }
                parent_key
            }
        };

        self.detach(key);
        let parent_id = NodeId::new(self.context, new_parent);
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = Some(parent_id);
        }
        if let Some(parent) = self.nodes.get_mut(new_parent) {
            parent.children.push(id);
        }
        Ok(())
    }

    /// Remove `id` and its whole subtree, returning every removed id
    pub fn unregister(&mut self, scope: &ContextScope, id: NodeId) -> SceneResult<Vec<NodeId>> {
        self.check_scope(scope)?;
        let key = self.resolve(id)?;
        if key == self.root {
            return Err(SceneError::RootNode);
        }

        self.detach(key);
        let mut removed = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                removed.push(NodeId::new(self.context, current));
                stack.extend(node.children.iter().rev().map(NodeId::key));
            }
        }
        log::trace!("Unregistered {} nodes from context {:?}", removed.len(), self.context);
        Ok(removed)
    }

    /// Borrow a node
    pub fn lookup(&self, scope: &ContextScope, id: NodeId) -> SceneResult<&SceneNode> {
        self.check_scope(scope)?;
        let key = self.resolve(id)?;
        self.nodes.get(key).ok_or(SceneError::NotFound { kind: "node" })
    }

    /// Mutably borrow a node
    pub fn node_mut(&mut self, scope: &ContextScope, id: NodeId) -> SceneResult<&mut SceneNode> {
        self.check_scope(scope)?;
        let key = self.resolve(id)?;
        self.nodes.get_mut(key).ok_or(SceneError::NotFound { kind: "node" })
    }

    /// Replace a node's local transform
    pub fn set_transform(&mut self, scope: &ContextScope, id: NodeId, transform: Transform) -> SceneResult<()> {
        self.node_mut(scope, id)?.transform = transform;
        Ok(())
    }

    /// Show or hide a node and its subtree
    pub fn set_visible(&mut self, scope: &ContextScope, id: NodeId, visible: bool) -> SceneResult<()> {
        self.node_mut(scope, id)?.visible = visible;
        Ok(())
    }

    /// Direct children of a node
    pub fn children(&self, scope: &ContextScope, id: NodeId) -> SceneResult<&[NodeId]> {
        self.lookup(scope, id).map(SceneNode::children)
    }

    /// Every node below `id` in depth-first order
    pub fn descendants(&self, scope: &ContextScope, id: NodeId) -> SceneResult<Vec<NodeId>> {
        let start = self.lookup(scope, id)?;
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = start.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(current.key()) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Draws for every visible renderable node, with composed world matrices
    pub fn collect_draws(&self) -> Vec<DrawItem> {
        let mut draws = Vec::new();
        let mut stack = vec![(self.root, Mat4::identity())];
        while let Some((key, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.to_matrix();
            if let Some(renderable) = &node.renderable {
                draws.push(DrawItem {
                    node: NodeId::new(self.context, key),
                    world,
                    geometry: renderable.geometry,
                    material: renderable.material,
                    texture: renderable.texture,
                    state: renderable.material_state,
                });
            }
            stack.extend(node.children.iter().rev().map(|child| (child.key(), world)));
        }
        draws
    }

    /// Remove every node except the root
    pub fn clear(&mut self) {
        let root = self.root;
        self.nodes.retain(|key, _| key == root);
        if let Some(root) = self.nodes.get_mut(root) {
            root.children.clear();
        }
    }

    fn check_scope(&self, scope: &ContextScope) -> SceneResult<()> {
        if scope.context() == self.context {
            Ok(())
        } else {
            Err(SceneError::ScopeViolation {
                caller: scope.context(),
                target: self.context,
            })
        }
    }

    fn resolve(&self, id: NodeId) -> SceneResult<NodeKey> {
        if id.context() != self.context {
            return Err(SceneError::ScopeViolation {
                caller: self.context,
                target: id.context(),
            });
        }
        if self.nodes.contains_key(id.key()) {
            Ok(id.key())
        } else {
            Err(SceneError::NotFound { kind: "node" })
        }
    }

    fn parent_key(&self, node: Option<NodeId>, parent: NodeId) -> SceneResult<NodeKey> {
        let reason = if parent.context() != self.context {
            ParentRejection::ForeignContext
        } else if !self.nodes.contains_key(parent.key()) {
            ParentRejection::Missing
        } else {
            return Ok(parent.key());
        };
        Err(SceneError::InvalidParent { node, parent, reason })
    }

    /// Whether `ancestor` lies on the path from `key` up to the root
    fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.nodes.get(k).and_then(|n| n.parent).map(|p| p.key());
        }
        false
    }

    fn detach(&mut self, key: NodeKey) {
        let parent = self.nodes.get(key).and_then(|n| n.parent);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.key())) {
            parent.children.retain(|child| child.key() != key);
        }
    }
}
