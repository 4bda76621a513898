//! Context scope token
//!
//! Registry operations take a [`ContextScope`] alongside the ids they touch.
//! Only the host mints scopes, one per mounted context, so code holding a
//! scope for context A cannot address context B's registry without the call
//! failing with [`crate::SceneError::ScopeViolation`].

use crate::foundation::collections::ContextId;

/// Proof of association with one context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextScope {
    context: ContextId,
}

impl ContextScope {
    pub(crate) fn new(context: ContextId) -> Self {
        Self { context }
    }

    /// Context this scope grants access to
    pub fn context(&self) -> ContextId {
        self.context
    }
}
