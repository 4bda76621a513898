//! Arena keys and context-scoped identifiers
//!
//! Every arena in the engine is a [`slotmap::SlotMap`]. Keys are generational,
//! so a key that outlives its slot never resolves to whatever reuses the slot.
//! Identifiers handed out to callers additionally carry the [`ContextId`] of
//! the scene that minted them, which is what lets each registry reject
//! foreign ids instead of silently resolving them against its own arena.
//! A [`ContextId`] in turn carries the [`HostTag`] of its host, so ids from
//! two hosts in one process never compare equal.

use std::sync::atomic::{AtomicU64, Ordering};

pub use slotmap::{Key, SlotMap};

static NEXT_HOST_TAG: AtomicU64 = AtomicU64::new(1);

slotmap::new_key_type! {
    /// Arena key of a context inside one host
    pub struct ContextKey;

    /// Arena key of a node inside one registry
    pub struct NodeKey;

    /// Arena key of a frame callback inside one scheduler
    pub struct CallbackKey;

    /// Arena key of an effect pass inside one pipeline
    pub struct PassKey;

    /// Arena key of a controller attachment inside one context
    pub struct ControllerKey;
}

/// Process-unique identity of one scene host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTag(u64);

impl HostTag {
    /// Draw a tag no other host in this process holds
    pub(crate) fn next() -> Self {
        Self(NEXT_HOST_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one scene context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId {
    host: HostTag,
    key: ContextKey,
}

impl ContextId {
    pub(crate) fn new(host: HostTag, key: ContextKey) -> Self {
        Self { host, key }
    }

    /// Host that minted this id
    pub fn host(&self) -> HostTag {
        self.host
    }

    pub(crate) fn key(&self) -> ContextKey {
        self.key
    }
}

/// Mints context ids outside a host
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ContextIds {
    host: HostTag,
    keys: SlotMap<ContextKey, ()>,
}

#[cfg(test)]
impl ContextIds {
    pub(crate) fn new() -> Self {
        Self {
            host: HostTag::next(),
            keys: SlotMap::with_key(),
        }
    }

    pub(crate) fn mint(&mut self) -> ContextId {
        ContextId::new(self.host, self.keys.insert(()))
    }

    pub(crate) fn retire(&mut self, id: ContextId) -> bool {
        self.keys.remove(id.key()).is_some()
    }
}

/// Arena key tagged with the context it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopedId<K> {
    context: ContextId,
    key: K,
}

impl<K: Key> ScopedId<K> {
    pub(crate) fn new(context: ContextId, key: K) -> Self {
        Self { context, key }
    }

    /// Context that minted this id
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub(crate) fn key(&self) -> K {
        self.key
    }
}

/// Identity of a scene node
pub type NodeId = ScopedId<NodeKey>;

/// Identity of a registered frame callback
pub type CallbackId = ScopedId<CallbackKey>;

/// Identity of an effect pass
pub type PassId = ScopedId<PassKey>;

/// Identity of a controller attached to a context
pub type ControllerId = ScopedId<ControllerKey>;
