//! Keyed pool of device resources shared across controllers
//!
//! The pool holds weak references only. A resource lives as long as some
//! controller holds its `Rc`; once the last holder drops it the handle
//! disposes itself and the entry becomes stale.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::render::{BackendResult, RenderDevice, ResourceDesc, ResourceHandle};

/// Deduplicates resources by key across controllers and contexts
#[derive(Debug, Default)]
pub struct SharedResourcePool {
    entries: HashMap<String, Weak<ResourceHandle>>,
}

impl SharedResourcePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live resource for `key`, allocating it when absent
    pub fn get_or_allocate(
        &mut self,
        key: &str,
        device: &RenderDevice,
        describe: impl FnOnce() -> ResourceDesc,
    ) -> BackendResult<Rc<ResourceHandle>> {
        if let Some(handle) = self.get(key) {
            log::trace!("Shared resource '{}' reused", key);
            return Ok(handle);
        }
        let handle = Rc::new(device.allocate(&describe())?);
        self.entries.insert(key.to_string(), Rc::downgrade(&handle));
        log::debug!("Shared resource '{}' allocated as {:?}", key, handle.id());
        Ok(handle)
    }

    /// Live resource for `key`
    pub fn get(&self, key: &str) -> Option<Rc<ResourceHandle>> {
        self.entries
            .get(key)
            .and_then(Weak::upgrade)
            .filter(|h| !h.is_disposed())
    }

    /// Whether `key` maps to a live resource
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Drop stale entries, returning how many were removed
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }

    /// Number of keys with a live resource
    pub fn live_entries(&self) -> usize {
        self.entries.values().filter(|w| w.strong_count() > 0).count()
    }
}
