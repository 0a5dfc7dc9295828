//! Handle-identity cache.
//!
//! Keeps at most one live [`ObjectHandle`] per fully-qualified name. Every
//! handle produced by resolution or iteration goes through
//! [`HandleCache::check_and_store`], so callers can compare handles by
//! pointer.

use lasso::{Rodeo, Spur};
use std::collections::HashMap;
use std::rc::Rc;

use crate::handle::ObjectHandle;

/// Maps interned fully-qualified names to their unique handle.
#[derive(Default)]
pub struct HandleCache {
    names: Rodeo,
    handles: HashMap<Spur, Rc<ObjectHandle>>,
}

impl HandleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` if its name is new, otherwise drops it and returns the
    /// handle already stored under that name.
    ///
    /// The dropped duplicate releases its native reference immediately and is
    /// never seen by callers.
    pub fn check_and_store(&mut self, handle: ObjectHandle) -> Rc<ObjectHandle> {
        let key = self.names.get_or_intern(handle.fullname());
        if let Some(existing) = self.handles.get(&key) {
            tracing::trace!(name = handle.fullname(), "duplicate handle discarded");
            return Rc::clone(existing);
        }
        let stored = Rc::new(handle);
        self.handles.insert(key, Rc::clone(&stored));
        stored
    }

    /// Looks up a handle by fully-qualified name.
    pub fn get(&self, fullname: &str) -> Option<Rc<ObjectHandle>> {
        let key = self.names.get(fullname)?;
        self.handles.get(&key).cloned()
    }

    /// Returns `true` if a handle is stored under `fullname`.
    pub fn contains(&self, fullname: &str) -> bool {
        self.names
            .get(fullname)
            .is_some_and(|key| self.handles.contains_key(&key))
    }

    /// Number of stored handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if no handles are stored.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drops every stored handle and returns how many there were.
    ///
    /// Handles still referenced elsewhere stay alive until their last clone
    /// is dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.handles.len();
        self.handles.clear();
        self.names = Rodeo::default();
        count
    }
}
