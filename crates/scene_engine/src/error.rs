//! Error types for the scene core
//!
//! Structural violations (scope, parent, disposed controller, destroyed
//! context) are programming errors in the composition layer and are returned
//! to the caller immediately. Only [`SceneError::InvalidParameter`] is
//! recoverable: controllers degrade to a fallback blueprint and keep going.

use thiserror::Error;

use crate::config::ConfigError;
use crate::foundation::collections::{ContextId, NodeId, PassId};
use crate::render::BackendError;

/// Why a parent was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRejection {
    /// The parent belongs to another context
    ForeignContext,
    /// The parent is a descendant of the node
    Cycle,
    /// A node cannot be its own parent
    SelfParent,
    /// The parent is not registered
    Missing,
}

/// Scene core errors
#[derive(Error, Debug)]
pub enum SceneError {
    /// Cross-context access attempt
    #[error("Scope violation: caller scoped to {caller:?} accessed context {target:?}")]
    ScopeViolation {
        /// Context the caller is associated with
        caller: ContextId,
        /// Context the accessed item belongs to
        target: ContextId,
    },

    /// Cycle or foreign-context parent
    #[error("Invalid parent {parent:?} for node {node:?}: {reason:?}")]
    InvalidParent {
        /// Node being registered or moved, `None` for a fresh registration
        node: Option<NodeId>,
        /// Rejected parent
        parent: NodeId,
        /// Rejection reason
        reason: ParentRejection,
    },

    /// Builder input out of domain
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Controller build attempted before or after the context lifetime
    #[error("Context {0:?} is unavailable")]
    ContextUnavailable(ContextId),

    /// Operation on a disposed controller
    #[error("Controller has been disposed")]
    ControllerDisposed,

    /// Operation on a destroyed context
    #[error("Context {0:?} has been destroyed")]
    ContextDestroyed(ContextId),

    /// Identity not present in its arena
    #[error("{kind} not found")]
    NotFound {
        /// Kind of item looked up
        kind: &'static str,
    },

    /// The root node cannot be moved or removed
    #[error("The root node cannot be moved or removed")]
    RootNode,

    /// Effect pass does not declare the parameter
    #[error("Pass {pass:?} has no parameter `{name}`")]
    UnknownParameter {
        /// Pass addressed
        pass: PassId,
        /// Parameter name
        name: String,
    },

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// GPU backend failure
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration file failure
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SceneError {
    /// Build an [`SceneError::InvalidParameter`]
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether a controller may degrade and continue instead of surfacing the error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }
}

/// Result type for scene core operations
pub type SceneResult<T> = Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invalid_parameter_is_recoverable() {
        assert!(SceneError::invalid_parameter("radius", "must be positive").is_recoverable());
        assert!(!SceneError::ControllerDisposed.is_recoverable());
        assert!(!SceneError::RootNode.is_recoverable());
    }

    #[test]
    fn test_display_names_parameter() {
        let err = SceneError::invalid_parameter("resolution", "must be at least 2");
        assert_eq!(err.to_string(), "Invalid parameter `resolution`: must be at least 2");
    }
}
