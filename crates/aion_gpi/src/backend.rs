//! The backend contract.
//!
//! A backend wraps one native simulator procedural interface. The adapter
//! asks backends to find objects, read and write values, and register native
//! callbacks; backends report native triggers back through the single
//! re-entry point, [`Reentry::fire`].
//!
//! Backends describe objects as [`NativeObject`]s and never build
//! [`ObjectHandle`]s themselves, so that every handle reaching an engine has
//! passed through the identity cache.

use std::rc::{Rc, Weak};

use crate::callback::CallbackId;
use crate::context::{Gpi, GpiInner};
use crate::handle::{NativeObject, NativeRef, ObjectHandle};
use crate::time::SimTime;
use crate::value::SetAction;

/// A failure reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    /// Creates a backend error from a description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Backend-side identifier of a native callback registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NativeCallback(pub u64);

/// Which relation of a parent an iterator walks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IterSelector {
    /// Child objects.
    Objects,
    /// Drivers of a signal.
    Drivers,
    /// Loads of a signal.
    Loads,
    /// Package scopes visible from the root.
    PackageScopes,
}

/// One step of a native iterator.
#[derive(Debug)]
pub enum IterStep {
    /// A fully described child.
    Native(NativeObject),
    /// A child exists but has no discoverable name.
    NativeNoName,
    /// A child with a name this backend cannot materialize.
    NotNative {
        /// The child's short name.
        name: String,
    },
    /// A nameless native reference this backend cannot materialize.
    NotNativeNoName {
        /// The raw reference.
        raw: NativeRef,
    },
    /// The iteration is exhausted.
    End,
}

/// A backend's stateful cursor over the children of one parent.
pub trait NativeIterator {
    /// Returns the next step. After [`IterStep::End`] the iterator is not
    /// polled again.
    fn next_step(&mut self) -> IterStep;
}

/// The single entry point backends use to deliver native triggers.
///
/// Holds a weak reference to the adapter context, so a backend storing it
/// does not keep the context alive.
#[derive(Clone)]
pub struct Reentry {
    inner: Weak<GpiInner>,
}

impl Reentry {
    pub(crate) fn new(inner: Weak<GpiInner>) -> Self {
        Self { inner }
    }

    /// Delivers a native trigger for `id`.
    ///
    /// Safe to call from inside a running callback: the trigger is queued and
    /// processed once the running callback returns.
    pub fn fire(&self, id: CallbackId) {
        match self.inner.upgrade() {
            Some(inner) => Gpi::from_inner(inner).handle_trigger(id),
            None => tracing::warn!(callback = %id, "trigger after adapter teardown dropped"),
        }
    }
}

/// A native simulator procedural interface.
///
/// All methods are called on the simulator thread. Implementations must not
/// call [`Reentry::fire`] while holding borrows that the fired callback could
/// need, since the user function may call straight back into the backend.
pub trait Backend {
    /// Unique backend name (e.g. `"vpi"`).
    fn name(&self) -> &str;

    /// Receives the re-entry point when the backend is registered.
    fn attach(&self, _reentry: Reentry) {}

    /// Requests the end of the simulation.
    fn sim_end(&self);

    /// Current simulation time.
    fn sim_time(&self) -> SimTime;

    /// Time precision as a power-of-ten exponent of seconds.
    fn sim_precision(&self) -> i32;

    /// Simulator product name.
    fn product(&self) -> String;

    /// Simulator version string.
    fn version(&self) -> String;

    /// Finds a root object by name, or the first root if `name` is `None`.
    fn root(&self, name: Option<&str>) -> Option<NativeObject>;

    /// Finds a child of `parent` by name.
    fn resolve_by_name(&self, parent: &ObjectHandle, name: &str) -> Option<NativeObject>;

    /// Finds a child of `parent` by index.
    fn resolve_by_index(&self, parent: &ObjectHandle, index: i32) -> Option<NativeObject>;

    /// Turns a raw native reference found under `parent` into an object.
    fn resolve_from_raw(&self, raw: NativeRef, parent: &ObjectHandle) -> Option<NativeObject>;

    /// If `label` names a family of generate iterations under `parent`,
    /// returns the fully-qualified name of their pseudo-region.
    fn generate_region(&self, _parent: &ObjectHandle, _label: &str) -> Option<String> {
        None
    }

    /// Starts iterating a relation of `parent`. `None` if unsupported.
    fn iterate(
        &self,
        parent: &ObjectHandle,
        selector: IterSelector,
    ) -> Option<Box<dyn NativeIterator>>;

    /// Registers a one-shot callback `delay` ticks from now.
    fn register_timed(&self, delay: u64, id: CallbackId) -> Result<NativeCallback, BackendError>;

    /// Registers a recurring read-only (end of time step) phase callback.
    fn register_readonly(&self, id: CallbackId) -> Result<NativeCallback, BackendError>;

    /// Registers a recurring read-write phase callback.
    fn register_readwrite(&self, id: CallbackId) -> Result<NativeCallback, BackendError>;

    /// Registers a recurring next-time-step phase callback.
    fn register_nexttime(&self, id: CallbackId) -> Result<NativeCallback, BackendError>;

    /// Registers a recurring callback on every value change of `signal`.
    fn register_value_change(
        &self,
        signal: &ObjectHandle,
        id: CallbackId,
    ) -> Result<NativeCallback, BackendError>;

    /// Registers a one-shot callback at simulation start.
    fn register_startup(&self, id: CallbackId) -> Result<NativeCallback, BackendError>;

    /// Registers a one-shot callback at simulation shutdown.
    fn register_shutdown(&self, id: CallbackId) -> Result<NativeCallback, BackendError>;

    /// Removes a native registration.
    fn deregister(&self, native: NativeCallback) -> Result<(), BackendError>;

    /// Describes a native callback reason code. Diagnostics only.
    fn reason_to_string(&self, reason: i32) -> String {
        format!("unknown reason {reason}")
    }

    /// Reads a signal as a binary string.
    fn value_binstr(&self, signal: &ObjectHandle) -> Result<String, BackendError>;

    /// Reads a signal as a character string.
    fn value_str(&self, signal: &ObjectHandle) -> Result<String, BackendError>;

    /// Reads a signal as a real.
    fn value_real(&self, signal: &ObjectHandle) -> Result<f64, BackendError>;

    /// Reads a signal as an integer.
    fn value_long(&self, signal: &ObjectHandle) -> Result<i64, BackendError>;

    /// Writes a binary-string value.
    fn set_value_binstr(
        &self,
        signal: &ObjectHandle,
        value: &str,
        action: SetAction,
    ) -> Result<(), BackendError>;

    /// Writes a character-string value.
    fn set_value_str(
        &self,
        signal: &ObjectHandle,
        value: &str,
        action: SetAction,
    ) -> Result<(), BackendError>;

    /// Writes a real value.
    fn set_value_real(
        &self,
        signal: &ObjectHandle,
        value: f64,
        action: SetAction,
    ) -> Result<(), BackendError>;

    /// Writes an integer value.
    fn set_value_long(
        &self,
        signal: &ObjectHandle,
        value: i64,
        action: SetAction,
    ) -> Result<(), BackendError>;

    /// Releases a native reference when its handle is dropped.
    fn release(&self, _native: NativeRef) {}
}

/// Shared pointer to a registered backend.
pub type BackendRef = Rc<dyn Backend>;
