//! Ordered backend registry and the cross-backend lookup order.
//!
//! Registration order is lookup order; the first backend registered is the
//! primary one, used for operations that need no specific owner (time,
//! precision, global phase callbacks, ending the simulation).
//!
//! The lookup methods here only decide *which* backend answers. Wrapping the
//! answer into a cached handle is done by the [`Gpi`](crate::Gpi) context.

use std::rc::Rc;

use crate::backend::BackendRef;
use crate::error::{GpiError, GpiResult};
use crate::handle::{NativeObject, NativeRef, ObjectHandle};

/// The ordered list of registered backends.
///
/// Cloning is cheap and gives a snapshot that can be walked while the
/// original stays free for re-entrant use.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<BackendRef>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a backend. Rejects a second backend with the same name.
    pub fn register(&mut self, backend: BackendRef) -> GpiResult<()> {
        if self.contains(backend.name()) {
            return Err(GpiError::DuplicateBackend(backend.name().to_string()));
        }
        self.backends.push(backend);
        Ok(())
    }

    /// Returns `true` if a backend named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.backends.iter().any(|b| b.name() == name)
    }

    /// The primary (first registered) backend.
    pub fn primary(&self) -> GpiResult<BackendRef> {
        self.backends.first().cloned().ok_or(GpiError::NoBackend)
    }

    /// Registered backend names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Asks each backend in order for a root object.
    pub fn find_root(&self, name: Option<&str>) -> Option<(BackendRef, NativeObject)> {
        self.backends
            .iter()
            .find_map(|b| b.root(name).map(|obj| (Rc::clone(b), obj)))
    }

    /// Backends to consult for a fallible lookup under `parent`: the owner
    /// first, then every other backend in registration order, leaving out the
    /// one named `skip`.
    pub fn lookup_order(&self, parent: &ObjectHandle, skip: Option<&str>) -> Vec<BackendRef> {
        let owner = parent.backend_name();
        let mut order = Vec::with_capacity(self.backends.len());
        if let Some(b) = self.backends.iter().find(|b| b.name() == owner) {
            order.push(Rc::clone(b));
        } else {
            order.push(Rc::clone(parent.backend()));
        }
        order.extend(
            self.backends
                .iter()
                .filter(|b| b.name() != owner)
                .cloned(),
        );
        order.retain(|b| Some(b.name()) != skip);
        order
    }

    /// Resolves a child by name, falling back across backends.
    pub fn find_by_name(
        &self,
        parent: &ObjectHandle,
        name: &str,
        skip: Option<&str>,
    ) -> Option<(BackendRef, NativeObject)> {
        self.lookup_order(parent, skip)
            .into_iter()
            .find_map(|b| b.resolve_by_name(parent, name).map(|obj| (b, obj)))
    }

    /// Resolves a child by index. Only the parent's owner is asked.
    pub fn find_by_index(
        &self,
        parent: &ObjectHandle,
        index: i32,
    ) -> Option<(BackendRef, NativeObject)> {
        let owner = Rc::clone(parent.backend());
        owner
            .resolve_by_index(parent, index)
            .map(|obj| (owner, obj))
    }

    /// Resolves a raw native reference, falling back across backends.
    pub fn find_from_raw(
        &self,
        parent: &ObjectHandle,
        raw: NativeRef,
        skip: Option<&str>,
    ) -> Option<(BackendRef, NativeObject)> {
        self.lookup_order(parent, skip)
            .into_iter()
            .find_map(|b| b.resolve_from_raw(raw, parent).map(|obj| (b, obj)))
    }
}
