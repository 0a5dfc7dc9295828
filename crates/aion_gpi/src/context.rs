//! The adapter context.
//!
//! [`Gpi`] owns everything the adapter keeps between calls: the backend
//! registry, the handle-identity cache, the callback table, the trigger queue,
//! and the edge scheduler. It is a cheap `Rc` clone and is passed explicitly
//! to everything that needs it, including every user callback.
//!
//! No `RefCell` borrow taken here is held across a call into a backend or
//! into user code, so user functions may call back into any operation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::backend::{BackendError, BackendRef, IterSelector, NativeCallback, Reentry};
use crate::cache::HandleCache;
use crate::callback::{CallbackFn, CallbackId, CallbackKind, CallbackState, CallbackTable};
use crate::dispatch::Dispatcher;
use crate::edge::{EdgeScheduler, Tracking};
use crate::error::{GpiError, GpiResult};
use crate::handle::{NativeObject, NativeRef, ObjectHandle, ObjectInfo, ObjectKind};
use crate::host::{EventLevel, HostEnvironment};
use crate::iterator::GpiIterator;
use crate::registry::BackendRegistry;
use crate::time::SimTime;
use crate::value::Edge;

/// Message sent to the host when the simulator stops without being asked to.
pub const PREMATURE_SHUTDOWN: &str = "Simulator shutdown prematurely";

/// Shared state behind a [`Gpi`].
pub(crate) struct GpiInner {
    registry: RefCell<BackendRegistry>,
    cache: RefCell<HandleCache>,
    callbacks: RefCell<CallbackTable>,
    dispatch: RefCell<Dispatcher>,
    edges: RefCell<EdgeScheduler>,
    host: RefCell<Option<Rc<dyn HostEnvironment>>>,
    finalizers: RefCell<Vec<Box<dyn FnOnce()>>>,
    sim_end_requested: Cell<bool>,
    finalized: Cell<bool>,
    // Dropped last: callbacks and backends above may hold code from these.
    libraries: RefCell<Vec<libloading::Library>>,
}

/// The adapter context.
#[derive(Clone)]
pub struct Gpi {
    inner: Rc<GpiInner>,
}

impl Default for Gpi {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Gpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gpi")
            .field("backends", &self.backend_names())
            .field("cached_handles", &self.cache_len())
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

impl Gpi {
    /// Creates an empty context with no backends.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(GpiInner {
                registry: RefCell::new(BackendRegistry::new()),
                cache: RefCell::new(HandleCache::new()),
                callbacks: RefCell::new(CallbackTable::default()),
                dispatch: RefCell::new(Dispatcher::default()),
                edges: RefCell::new(EdgeScheduler::default()),
                host: RefCell::new(None),
                finalizers: RefCell::new(Vec::new()),
                sim_end_requested: Cell::new(false),
                finalized: Cell::new(false),
                libraries: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<GpiInner>) -> Self {
        Self { inner }
    }

    /// Returns `true` if both values refer to the same context.
    pub fn ptr_eq(&self, other: &Gpi) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- backends -------------------------------------------------------

    /// Registers a backend and hands it the re-entry point.
    ///
    /// A second backend with an already registered name is rejected with a
    /// warning; the first one stays authoritative.
    pub fn register_backend(&self, backend: BackendRef) -> GpiResult<()> {
        let result = self
            .inner
            .registry
            .borrow_mut()
            .register(Rc::clone(&backend));
        if let Err(err) = result {
            err.report();
            return Err(err);
        }
        backend.attach(Reentry::new(Rc::downgrade(&self.inner)));
        tracing::info!(backend = backend.name(), "backend registered");
        Ok(())
    }

    /// Names of registered backends in registration order.
    pub fn backend_names(&self) -> Vec<String> {
        self.inner.registry.borrow().names()
    }

    fn registry(&self) -> BackendRegistry {
        self.inner.registry.borrow().clone()
    }

    fn primary(&self) -> GpiResult<BackendRef> {
        self.inner.registry.borrow().primary()
    }

    /// Current simulation time from the primary backend.
    pub fn sim_time(&self) -> GpiResult<SimTime> {
        Ok(self.primary()?.sim_time())
    }

    /// Time precision exponent from the primary backend.
    pub fn sim_precision(&self) -> GpiResult<i32> {
        Ok(self.primary()?.sim_precision())
    }

    /// Simulator product name from the primary backend.
    pub fn simulator_product(&self) -> GpiResult<String> {
        Ok(self.primary()?.product())
    }

    /// Simulator version from the primary backend.
    pub fn simulator_version(&self) -> GpiResult<String> {
        Ok(self.primary()?.version())
    }

    /// Asks the primary backend to end the simulation.
    ///
    /// Remembers the request, so the shutdown that follows is not reported as
    /// premature.
    pub fn sim_end(&self) -> GpiResult<()> {
        let primary = self.primary()?;
        self.inner.sim_end_requested.set(true);
        tracing::info!(backend = primary.name(), "simulation end requested");
        primary.sim_end();
        Ok(())
    }

    /// Returns `true` once [`sim_end`](Self::sim_end) has been called.
    pub fn sim_end_requested(&self) -> bool {
        self.inner.sim_end_requested.get()
    }

    // ---- resolution -----------------------------------------------------

    /// Wraps a backend description into a cached handle.
    pub(crate) fn adopt(&self, backend: BackendRef, obj: NativeObject) -> Rc<ObjectHandle> {
        let NativeObject {
            native,
            name,
            fullname,
            info,
            ..
        } = obj;
        let handle = ObjectHandle::new(backend, native, info);
        if let Err(err) = handle.initialise(name, fullname) {
            err.report();
        }
        self.store(handle)
    }

    /// Synthesizes the pseudo-region grouping the generate iterations
    /// labelled `label` under `parent`. It shares the parent's native
    /// reference.
    pub(crate) fn pseudo_region(
        &self,
        parent: &ObjectHandle,
        label: &str,
        region_fullname: &str,
    ) -> Rc<ObjectHandle> {
        let handle = ObjectHandle::borrowing(
            Rc::clone(parent.backend()),
            parent.native(),
            ObjectInfo::scope(ObjectKind::GenArray),
        );
        if let Err(err) = handle.initialise(label, region_fullname) {
            err.report();
        }
        tracing::debug!(parent = parent.fullname(), region = region_fullname, "pseudo-region synthesized");
        self.store(handle)
    }

    fn store(&self, handle: ObjectHandle) -> Rc<ObjectHandle> {
        // A duplicate is dropped, and so released, after the borrow ends.
        let existing = self.inner.cache.borrow().get(handle.fullname());
        match existing {
            Some(existing) => {
                tracing::trace!(name = handle.fullname(), "duplicate handle discarded");
                existing
            }
            None => self.inner.cache.borrow_mut().check_and_store(handle),
        }
    }

    /// Finds a root object: each backend in order, first hit wins.
    ///
    /// `None` asks for the first root of each backend.
    pub fn root_handle(&self, name: Option<&str>) -> GpiResult<Rc<ObjectHandle>> {
        match self.registry().find_root(name) {
            Some((backend, obj)) => Ok(self.adopt(backend, obj)),
            None => {
                let err = GpiError::NoRootHandle {
                    name: name.map(str::to_string),
                };
                err.report();
                Err(err)
            }
        }
    }

    /// Resolves a child by name across every backend.
    pub fn child_by_name(&self, parent: &ObjectHandle, name: &str) -> GpiResult<Rc<ObjectHandle>> {
        self.resolve_child_by_name(parent, name, None)
    }

    /// Resolves a child by name.
    ///
    /// The owner of `parent` is asked first, then the other backends in
    /// registration order; the backend named `skip` is never asked. If all
    /// fail and the owner was not skipped, the owner is asked whether `name`
    /// labels a family of generate iterations, in which case their
    /// pseudo-region is returned.
    pub fn resolve_child_by_name(
        &self,
        parent: &ObjectHandle,
        name: &str,
        skip: Option<&str>,
    ) -> GpiResult<Rc<ObjectHandle>> {
        if let Some((backend, obj)) = self.registry().find_by_name(parent, name, skip) {
            return Ok(self.adopt(backend, obj));
        }
        if skip != Some(parent.backend_name()) {
            if let Some(region) = parent.backend().generate_region(parent, name) {
                return Ok(self.pseudo_region(parent, name, &region));
            }
        }
        let err = GpiError::ChildNotFound {
            parent: parent.fullname().to_string(),
            name: name.to_string(),
        };
        err.report();
        Err(err)
    }

    /// Resolves a child by index. Only the owner of `parent` is asked.
    pub fn child_by_index(&self, parent: &ObjectHandle, index: i32) -> GpiResult<Rc<ObjectHandle>> {
        match self.registry().find_by_index(parent, index) {
            Some((backend, obj)) => Ok(self.adopt(backend, obj)),
            None => {
                let err = GpiError::IndexNotFound {
                    parent: parent.fullname().to_string(),
                    index,
                };
                err.report();
                Err(err)
            }
        }
    }

    /// Resolves a raw native reference with the same fallback order as
    /// [`resolve_child_by_name`](Self::resolve_child_by_name).
    pub fn resolve_child_from_raw(
        &self,
        parent: &ObjectHandle,
        raw: NativeRef,
        skip: Option<&str>,
    ) -> GpiResult<Rc<ObjectHandle>> {
        match self.registry().find_from_raw(parent, raw, skip) {
            Some((backend, obj)) => Ok(self.adopt(backend, obj)),
            None => {
                let err = GpiError::RawNotFound {
                    parent: parent.fullname().to_string(),
                    raw: raw.0,
                };
                err.report();
                Err(err)
            }
        }
    }

    /// Starts a lazy walk over a relation of `parent`.
    ///
    /// Returns `None` if the owning backend cannot iterate it.
    pub fn iterate(&self, parent: &Rc<ObjectHandle>, selector: IterSelector) -> Option<GpiIterator> {
        let native = parent.backend().iterate(parent, selector);
        if native.is_none() {
            tracing::debug!(parent = parent.fullname(), ?selector, "iteration not supported");
        }
        native.map(|native| GpiIterator::new(self.clone(), Rc::clone(parent), native))
    }

    /// The cached handle for `fullname`, if one has been resolved.
    pub fn cached_handle(&self, fullname: &str) -> Option<Rc<ObjectHandle>> {
        self.inner.cache.borrow().get(fullname)
    }

    /// Number of handles in the identity cache.
    pub fn cache_len(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    // ---- callbacks ------------------------------------------------------

    /// Creates a callback in the `FREE` state.
    ///
    /// Value-change and edge callbacks must target a signal.
    pub fn create_callback<F>(&self, kind: CallbackKind, func: F) -> GpiResult<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        if let CallbackKind::ValueChange { signal, .. } | CallbackKind::EdgeCount { signal, .. } =
            &kind
        {
            if !signal.is_signal() {
                let err = GpiError::NotASignal(signal.fullname().to_string());
                err.report();
                return Err(err);
            }
        }
        let label = kind.label();
        let func: CallbackFn = Box::new(func);
        let id = self.inner.callbacks.borrow_mut().insert(kind, func);
        tracing::debug!(callback = %id, kind = label, "callback created");
        Ok(id)
    }

    /// Creates a timed callback `delay` ticks from when it is armed.
    pub fn create_timed_callback<F>(&self, delay: u64, func: F) -> CallbackId
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.insert_callback(CallbackKind::Timed { delay }, Box::new(func))
    }

    /// Creates a recurring read-only phase callback.
    pub fn create_readonly_callback<F>(&self, func: F) -> CallbackId
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.insert_callback(CallbackKind::ReadOnly, Box::new(func))
    }

    /// Creates a recurring read-write phase callback.
    pub fn create_readwrite_callback<F>(&self, func: F) -> CallbackId
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.insert_callback(CallbackKind::ReadWrite, Box::new(func))
    }

    /// Creates a recurring next-time-step callback.
    pub fn create_nexttime_callback<F>(&self, func: F) -> CallbackId
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.insert_callback(CallbackKind::NextTime, Box::new(func))
    }

    /// Creates a recurring value-change callback filtered by `edge`.
    pub fn create_value_change_callback<F>(
        &self,
        signal: &Rc<ObjectHandle>,
        edge: Edge,
        func: F,
    ) -> GpiResult<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        let kind = CallbackKind::ValueChange {
            signal: Rc::clone(signal),
            edge,
        };
        self.create_callback(kind, func)
    }

    /// Creates a one-shot callback for the `count`-th `edge` of `signal`.
    pub fn create_edge_callback<F>(
        &self,
        signal: &Rc<ObjectHandle>,
        edge: Edge,
        count: u32,
        func: F,
    ) -> GpiResult<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        let kind = CallbackKind::EdgeCount {
            signal: Rc::clone(signal),
            edge,
            count,
        };
        self.create_callback(kind, func)
    }

    /// Creates a one-shot simulation-start callback.
    pub fn create_startup_callback<F>(&self, func: F) -> CallbackId
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.insert_callback(CallbackKind::Startup, Box::new(func))
    }

    /// Creates a one-shot simulation-shutdown callback.
    pub fn create_shutdown_callback<F>(&self, func: F) -> CallbackId
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.insert_callback(CallbackKind::Shutdown, Box::new(func))
    }

    fn insert_callback(&self, kind: CallbackKind, func: CallbackFn) -> CallbackId {
        let label = kind.label();
        let id = self.inner.callbacks.borrow_mut().insert(kind, func);
        tracing::debug!(callback = %id, kind = label, "callback created");
        id
    }

    /// Arms a `FREE` callback: `FREE → PRIMED`.
    ///
    /// Timed, phase, startup, and shutdown callbacks go to the primary
    /// backend; value-change callbacks to the signal's owner; edge callbacks
    /// to the edge scheduler. On failure the callback stays `FREE`.
    pub fn arm(&self, id: CallbackId) -> GpiResult<()> {
        let kind = {
            let table = self.inner.callbacks.borrow();
            let record = table.get(id).ok_or(GpiError::UnknownCallback(id))?;
            if record.state != CallbackState::Free {
                return Err(GpiError::AlreadyArmed(id));
            }
            record.kind.clone()
        };
        let native = match &kind {
            CallbackKind::EdgeCount {
                signal,
                edge,
                count,
            } => {
                self.arm_edge(id, signal, *edge, *count)?;
                None
            }
            _ => Some(self.register_native(&kind, id)?),
        };
        if let Some(record) = self.inner.callbacks.borrow_mut().get_mut(id) {
            record.state = CallbackState::Primed;
            record.native = native;
        }
        tracing::debug!(callback = %id, kind = kind.label(), "callback armed");
        Ok(())
    }

    fn register_native(
        &self,
        kind: &CallbackKind,
        id: CallbackId,
    ) -> GpiResult<(BackendRef, NativeCallback)> {
        let backend = match kind {
            CallbackKind::ValueChange { signal, .. } => Rc::clone(signal.backend()),
            _ => self.primary()?,
        };
        let result = match kind {
            CallbackKind::Timed { delay } => backend.register_timed(*delay, id),
            CallbackKind::ReadOnly => backend.register_readonly(id),
            CallbackKind::ReadWrite => backend.register_readwrite(id),
            CallbackKind::NextTime => backend.register_nexttime(id),
            CallbackKind::ValueChange { signal, .. } => backend.register_value_change(signal, id),
            CallbackKind::Startup => backend.register_startup(id),
            CallbackKind::Shutdown => backend.register_shutdown(id),
            CallbackKind::EdgeCount { .. } => Err(BackendError::new(
                "edge callbacks are scheduled by the adapter",
            )),
        };
        match result {
            Ok(native) => Ok((backend, native)),
            Err(err) => Err(GpiError::Backend {
                backend: backend.name().to_string(),
                reason: err.to_string(),
            }),
        }
    }

    fn arm_edge(&self, id: CallbackId, signal: &Rc<ObjectHandle>, edge: Edge, count: u32) -> GpiResult<()> {
        let fullname = signal.fullname().to_string();
        let tracking = self.inner.edges.borrow_mut().add(signal, edge, count, id);
        if tracking == Tracking::Joined {
            return Ok(());
        }
        let key = fullname.clone();
        let subscription = self.insert_callback(
            CallbackKind::ValueChange {
                signal: Rc::clone(signal),
                edge: Edge::ValueChange,
            },
            Box::new(move |gpi: &Gpi| gpi.deliver_edges(&key)),
        );
        if let Err(err) = self.arm(subscription) {
            self.inner.edges.borrow_mut().remove(&fullname, id);
            self.destroy(subscription, false);
            return Err(err);
        }
        self.inner
            .edges
            .borrow_mut()
            .set_subscription(&fullname, subscription);
        tracing::debug!(signal = %fullname, subscription = %subscription, "edge tracking started");
        Ok(())
    }

    /// Removes a callback.
    ///
    /// `FREE` is destroyed; `PRIMED` is deregistered and destroyed; `CALL`
    /// becomes `DELETE` and is destroyed when its user function returns;
    /// `DELETE` is left alone. Any queued trigger for it is dropped.
    pub fn remove(&self, id: CallbackId) -> GpiResult<()> {
        let state = self
            .inner
            .callbacks
            .borrow()
            .state(id)
            .ok_or(GpiError::UnknownCallback(id))?;
        self.inner.dispatch.borrow_mut().forget(id);
        match state {
            CallbackState::Free => self.destroy(id, false),
            CallbackState::Primed => self.destroy(id, true),
            CallbackState::Call => {
                if let Some(record) = self.inner.callbacks.borrow_mut().get_mut(id) {
                    record.state = CallbackState::Delete;
                }
                tracing::debug!(callback = %id, "removal deferred until callback returns");
            }
            CallbackState::Delete => {}
        }
        Ok(())
    }

    fn destroy(&self, id: CallbackId, deregister: bool) {
        let Some(record) = self.inner.callbacks.borrow_mut().remove(id) else {
            return;
        };
        // A trigger queued while the callback was in DELETE would otherwise
        // surface later as one for an unknown id.
        self.inner.dispatch.borrow_mut().forget(id);
        if deregister {
            if let Some((backend, native)) = &record.native {
                if let Err(err) = backend.deregister(*native) {
                    tracing::warn!(callback = %id, backend = backend.name(), error = %err, "deregistration failed");
                }
            }
            if let CallbackKind::EdgeCount { signal, .. } = &record.kind {
                let idle = self.inner.edges.borrow_mut().remove(signal.fullname(), id);
                if let Some(subscription) = idle {
                    self.release_subscription(signal.fullname(), subscription);
                }
            }
        }
        tracing::debug!(callback = %id, kind = record.kind.label(), "callback destroyed");
    }

    fn release_subscription(&self, signal: &str, subscription: CallbackId) {
        tracing::debug!(signal, subscription = %subscription, "edge tracking stopped");
        if let Err(err) = self.remove(subscription) {
            err.report();
        }
    }

    /// Returns `true` while a native trigger is being processed.
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatch.borrow().is_active()
    }

    /// Current counter of an edge class on a tracked signal.
    ///
    /// `None` if no edge callback currently waits on the signal.
    pub fn edge_count(&self, signal: &ObjectHandle, edge: Edge) -> Option<u64> {
        self.inner.edges.borrow().count(signal.fullname(), edge)
    }

    /// Current state of a callback, `None` once destroyed.
    pub fn callback_state(&self, id: CallbackId) -> Option<CallbackState> {
        self.inner.callbacks.borrow().state(id)
    }

    /// Number of live callbacks, including internal edge subscriptions.
    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    fn create_and_arm(&self, created: GpiResult<CallbackId>) -> Option<CallbackId> {
        let id = match created {
            Ok(id) => id,
            Err(err) => {
                err.report();
                return None;
            }
        };
        match self.arm(id) {
            Ok(()) => Some(id),
            Err(err) => {
                err.report();
                self.destroy(id, false);
                None
            }
        }
    }

    /// Creates and arms a timed callback. `None` if arming failed.
    pub fn register_timed_callback<F>(&self, delay: u64, func: F) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(Ok(self.create_timed_callback(delay, func)))
    }

    /// Creates and arms a read-only phase callback.
    pub fn register_readonly_callback<F>(&self, func: F) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(Ok(self.create_readonly_callback(func)))
    }

    /// Creates and arms a read-write phase callback.
    pub fn register_readwrite_callback<F>(&self, func: F) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(Ok(self.create_readwrite_callback(func)))
    }

    /// Creates and arms a next-time-step callback.
    pub fn register_nexttime_callback<F>(&self, func: F) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(Ok(self.create_nexttime_callback(func)))
    }

    /// Creates and arms an edge-filtered value-change callback.
    pub fn register_value_change_callback<F>(
        &self,
        signal: &Rc<ObjectHandle>,
        edge: Edge,
        func: F,
    ) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(self.create_value_change_callback(signal, edge, func))
    }

    /// Creates and arms an edge-count callback.
    pub fn register_edge_callback<F>(
        &self,
        signal: &Rc<ObjectHandle>,
        edge: Edge,
        count: u32,
        func: F,
    ) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(self.create_edge_callback(signal, edge, count, func))
    }

    /// Creates and arms a startup callback.
    pub fn register_startup_callback<F>(&self, func: F) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(Ok(self.create_startup_callback(func)))
    }

    /// Creates and arms a shutdown callback.
    pub fn register_shutdown_callback<F>(&self, func: F) -> Option<CallbackId>
    where
        F: FnMut(&Gpi) + 'static,
    {
        self.create_and_arm(Ok(self.create_shutdown_callback(func)))
    }

    // ---- dispatch -------------------------------------------------------

    /// Processes a native trigger. Reached through [`Reentry::fire`].
    ///
    /// A trigger arriving while another is being processed is queued and
    /// handled after it, in arrival order. A trigger for an unknown callback,
    /// or one that is not `PRIMED`, corrupts dispatch and ends the session.
    pub(crate) fn handle_trigger(&self, id: CallbackId) {
        if !self.inner.dispatch.borrow_mut().enter(id) {
            let pending = self.inner.dispatch.borrow().pending();
            tracing::trace!(callback = %id, pending, "trigger queued behind active callback");
            return;
        }
        let mut next = Some(id);
        while let Some(id) = next {
            if let Err(err) = self.dispatch_one(id) {
                if err.is_fatal() {
                    self.fatal(&err);
                    return;
                }
                err.report();
            }
            next = self.inner.dispatch.borrow_mut().next();
        }
    }

    fn dispatch_one(&self, id: CallbackId) -> GpiResult<()> {
        let check = {
            let table = self.inner.callbacks.borrow();
            table.get(id).map(|r| (r.state, r.native.is_some()))
        };
        match check {
            None => Err(GpiError::CorruptDispatch(format!(
                "trigger for unknown callback {id}"
            ))),
            Some((CallbackState::Primed, true)) => self.run_callback(id),
            Some((CallbackState::Primed, false)) => Err(GpiError::CorruptDispatch(format!(
                "trigger for callback {id} that is not natively registered"
            ))),
            Some((state, _)) => Err(GpiError::CorruptDispatch(format!(
                "trigger for callback {id} in state {state}"
            ))),
        }
    }

    /// Runs a `PRIMED` callback: `PRIMED → CALL`, user function, then back to
    /// `PRIMED` (recurring) or destroyed (one-shot or `DELETE`).
    ///
    /// Edge-filtered value-change callbacks whose filter does not match the
    /// new value stay `PRIMED` without running.
    pub(crate) fn run_callback(&self, id: CallbackId) -> GpiResult<()> {
        let kind = {
            let table = self.inner.callbacks.borrow();
            let record = table.get(id).ok_or(GpiError::UnknownCallback(id))?;
            if record.state != CallbackState::Primed {
                return Err(GpiError::CorruptDispatch(format!(
                    "callback {id} run in state {}",
                    record.state
                )));
            }
            record.kind.clone()
        };
        if let CallbackKind::ValueChange { signal, edge } = &kind {
            if *edge != Edge::ValueChange {
                let value = signal.value_binstr()?;
                if !edge.matches(&value) {
                    tracing::trace!(callback = %id, %edge, value = %value, "edge filter not matched");
                    return Ok(());
                }
            }
        }
        let func = {
            let mut table = self.inner.callbacks.borrow_mut();
            match table.get_mut(id) {
                Some(record) => {
                    record.state = CallbackState::Call;
                    record.func.take()
                }
                None => None,
            }
        };
        tracing::debug!(callback = %id, kind = kind.label(), "callback fired");
        let mut func = func;
        if let Some(f) = func.as_mut() {
            f(self);
        }
        let state = {
            let mut table = self.inner.callbacks.borrow_mut();
            match table.get_mut(id) {
                Some(record) => {
                    if record.state == CallbackState::Call && kind.is_recurring() {
                        record.state = CallbackState::Primed;
                        record.func = func.take();
                    }
                    Some(record.state)
                }
                None => None,
            }
        };
        match state {
            Some(CallbackState::Call) => self.destroy(id, false),
            // A recurring registration is still live natively.
            Some(CallbackState::Delete) => self.destroy(id, kind.is_recurring()),
            _ => {}
        }
        // Closure state is dropped outside every borrow.
        drop(func);
        Ok(())
    }

    /// Feeds the current value of a tracked signal to the edge scheduler and
    /// runs every edge callback that became due.
    fn deliver_edges(&self, fullname: &str) {
        let Some(signal) = self.inner.edges.borrow().signal(fullname) else {
            return;
        };
        let value = match signal.value_binstr() {
            Ok(value) => value,
            Err(err) => {
                err.report();
                return;
            }
        };
        let due = self.inner.edges.borrow_mut().deliver(fullname, &value);
        for id in due {
            match self.run_callback(id) {
                Ok(()) => {}
                Err(GpiError::UnknownCallback(_)) => {
                    tracing::trace!(callback = %id, "edge callback removed before it ran");
                }
                Err(err) => err.report(),
            }
        }
        let idle = self.inner.edges.borrow_mut().release_if_idle(fullname);
        if let Some(subscription) = idle {
            self.release_subscription(fullname, subscription);
        }
    }

    /// Ends the session after dispatch became inconsistent.
    fn fatal(&self, err: &GpiError) {
        tracing::error!(error = %err, "critical: callback dispatch corrupted, ending simulation");
        let dropped = self.inner.dispatch.borrow_mut().abort();
        if dropped > 0 {
            tracing::error!(dropped, "queued triggers discarded");
        }
        self.host_event(EventLevel::Fail, PREMATURE_SHUTDOWN);
        // The host has been told; the shutdown that follows is not premature.
        self.inner.sim_end_requested.set(true);
        match self.primary() {
            Ok(primary) => primary.sim_end(),
            Err(err) => err.report(),
        }
    }

    // ---- host and lifecycle ---------------------------------------------

    /// Installs the host environment.
    pub fn set_host(&self, host: Rc<dyn HostEnvironment>) {
        *self.inner.host.borrow_mut() = Some(host);
    }

    fn host(&self) -> Option<Rc<dyn HostEnvironment>> {
        self.inner.host.borrow().clone()
    }

    /// Starts the host engine.
    pub fn host_init(&self, args: &[String]) -> GpiResult<()> {
        let host = self
            .host()
            .ok_or_else(|| GpiError::Host("no host environment installed".into()))?;
        tracing::info!(args = args.len(), "initialising host environment");
        host.init(self, args)
            .map_err(|err| GpiError::Host(err.to_string()))
    }

    /// Stops the host engine.
    pub fn host_end(&self) {
        match self.host() {
            Some(host) => host.end(),
            None => tracing::debug!("no host environment to end"),
        }
    }

    /// Forwards an event to the host, or logs it if there is none.
    pub fn host_event(&self, level: EventLevel, message: &str) {
        match self.host() {
            Some(host) => host.event(level, message),
            None => tracing::warn!(%level, message, "host event without host environment"),
        }
    }

    /// Wires the host into the simulation lifecycle.
    ///
    /// At startup the host is initialised with `args`; if that fails the
    /// simulation is ended. At shutdown the host is told if nobody requested
    /// the end, then stopped, then the adapter is finalized.
    pub fn bootstrap(&self, host: Rc<dyn HostEnvironment>, args: Vec<String>) -> GpiResult<()> {
        self.set_host(host);
        let startup = self.create_startup_callback(move |gpi: &Gpi| {
            if let Err(err) = gpi.host_init(&args) {
                err.report();
                if let Err(err) = gpi.sim_end() {
                    err.report();
                }
            }
        });
        if let Err(err) = self.arm(startup) {
            self.destroy(startup, false);
            return Err(err);
        }
        let shutdown = self.create_shutdown_callback(|gpi: &Gpi| {
            if !gpi.sim_end_requested() {
                gpi.host_event(EventLevel::Fail, PREMATURE_SHUTDOWN);
            }
            gpi.host_end();
            gpi.finalize();
        });
        if let Err(err) = self.arm(shutdown) {
            self.destroy(shutdown, false);
            return Err(err);
        }
        Ok(())
    }

    /// Registers a function to run during [`finalize`](Self::finalize).
    pub fn register_finalize_callback<F>(&self, func: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.finalizers.borrow_mut().push(Box::new(func));
    }

    /// Clears the identity cache, then runs finalize callbacks in reverse
    /// registration order. Only the first call has any effect.
    pub fn finalize(&self) {
        if self.inner.finalized.replace(true) {
            return;
        }
        let mut cache = std::mem::take(&mut *self.inner.cache.borrow_mut());
        let cleared = cache.clear();
        let finalizers = std::mem::take(&mut *self.inner.finalizers.borrow_mut());
        tracing::info!(cleared, finalizers = finalizers.len(), "finalizing adapter");
        for func in finalizers.into_iter().rev() {
            func();
        }
    }

    /// Returns `true` once [`finalize`](Self::finalize) has run.
    pub fn is_finalized(&self) -> bool {
        self.inner.finalized.get()
    }

    pub(crate) fn keep_library(&self, library: libloading::Library) {
        self.inner.libraries.borrow_mut().push(library);
    }
}
