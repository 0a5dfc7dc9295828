//! [`ModelBackend`]: an in-memory simulator behind the [`Backend`] contract.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;

use aion_gpi::{
    Backend, BackendError, CallbackId, IterSelector, IterStep, NativeCallback, NativeIterator,
    NativeObject, NativeRef, ObjectHandle, Reentry, SetAction, SimTime,
};

use crate::design::Design;
use crate::error::ModelError;
use crate::hierarchy::{Child, Hierarchy};
use crate::schedule::{Phase, Schedule, Trigger};
use crate::signal::{SignalState, Value};

/// A native iterator over a precomputed list of steps.
struct StepIter {
    steps: VecDeque<IterStep>,
}

impl NativeIterator for StepIter {
    fn next_step(&mut self) -> IterStep {
        self.steps.pop_front().unwrap_or(IterStep::End)
    }
}

/// A simulator over a static [`Design`].
///
/// Values change only when written through the adapter or by
/// [`poke`](Self::poke). Time advances only when driven by
/// [`run_until`](Self::run_until) or [`step`](Self::step); each time step
/// fires next-time callbacks, then timed callbacks, then read-write and
/// read-only callbacks.
///
/// Every lookup the adapter asks for is recorded, so tests can check which
/// requests reach the backend and which the identity cache absorbs.
pub struct ModelBackend {
    name: String,
    product: String,
    version: String,
    precision: i32,
    hierarchy: Hierarchy,
    values: RefCell<HashMap<usize, SignalState>>,
    schedule: RefCell<Schedule>,
    lookups: RefCell<Vec<String>>,
    released: Cell<usize>,
    end_requested: Cell<bool>,
    reentry: RefCell<Option<Reentry>>,
}

impl std::fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend")
            .field("name", &self.name)
            .field("top", &self.hierarchy.top().fullname)
            .field("objects", &self.hierarchy.len())
            .field("now", &self.now())
            .finish()
    }
}

fn invalid(path: &str, reason: String) -> ModelError {
    ModelError::InvalidValue {
        path: path.to_string(),
        reason,
    }
}

impl ModelBackend {
    /// Builds a backend named `name` from a design.
    pub fn from_design(name: impl Into<String>, design: Design) -> Result<Rc<Self>, ModelError> {
        let precision = aion_gpi::time::parse_precision(&design.precision)
            .ok_or_else(|| ModelError::InvalidPrecision(design.precision.clone()))?;
        let hierarchy = Hierarchy::build(&design)?;
        let mut values = HashMap::new();
        for id in hierarchy.signals() {
            let node = hierarchy.node(id);
            if let Some(spec) = &node.signal {
                let state = SignalState::new(spec).map_err(|r| invalid(&node.fullname, r))?;
                values.insert(id, state);
            }
        }
        let name = name.into();
        tracing::debug!(backend = %name, top = %design.top, objects = hierarchy.len(), "model built");
        Ok(Rc::new(Self {
            name,
            product: design.product,
            version: design.version,
            precision,
            hierarchy,
            values: RefCell::new(values),
            schedule: RefCell::new(Schedule::default()),
            lookups: RefCell::new(Vec::new()),
            released: Cell::new(0),
            end_requested: Cell::new(false),
            reentry: RefCell::new(None),
        }))
    }

    /// Builds a backend from design TOML.
    pub fn from_toml_str(name: impl Into<String>, content: &str) -> Result<Rc<Self>, ModelError> {
        Self::from_design(name, Design::from_toml_str(content)?)
    }

    /// Builds a backend from a design file.
    pub fn load(name: impl Into<String>, path: &Path) -> Result<Rc<Self>, ModelError> {
        Self::from_design(name, Design::load(path)?)
    }

    /// Current time in ticks.
    pub fn now(&self) -> u64 {
        self.schedule.borrow().now()
    }

    /// Fires the startup callbacks.
    pub fn start(&self) {
        tracing::debug!(backend = %self.name, "start of simulation");
        self.fire_phase(Phase::Startup);
    }

    /// Fires the shutdown callbacks.
    pub fn finish(&self) {
        tracing::debug!(backend = %self.name, time = self.now(), "end of simulation");
        self.fire_phase(Phase::Shutdown);
    }

    /// Runs the next time step that has timed events. Returns its time, or
    /// `None` if nothing is scheduled.
    pub fn step(&self) -> Option<u64> {
        let (time, advanced) = {
            let mut schedule = self.schedule.borrow_mut();
            let time = schedule.next_time()?;
            let advanced = time > schedule.now();
            if advanced {
                schedule.set_now(time);
            }
            (time, advanced)
        };
        if advanced {
            self.fire_phase(Phase::NextTime);
        }
        loop {
            let due = self.schedule.borrow_mut().pop_due(time);
            match due {
                Some(native) => self.fire_native(native),
                None => break,
            }
        }
        self.settle();
        Some(time)
    }

    /// Runs every time step up to and including `time`, then moves the
    /// clock to `time`. Returns the number of steps run.
    pub fn run_until(&self, time: u64) -> usize {
        let mut steps = 0;
        loop {
            let next = self.schedule.borrow_mut().next_time();
            match next {
                Some(t) if t <= time && !self.end_requested.get() => {
                    self.step();
                    steps += 1;
                }
                _ => break,
            }
        }
        let mut schedule = self.schedule.borrow_mut();
        if schedule.now() < time {
            schedule.set_now(time);
        }
        steps
    }

    /// Runs for `delta` ticks from now.
    pub fn run_for(&self, delta: u64) -> usize {
        self.run_until(self.now().saturating_add(delta))
    }

    /// Fires the read-write then read-only callbacks of the current step.
    pub fn settle(&self) {
        self.fire_phase(Phase::ReadWrite);
        self.fire_phase(Phase::ReadOnly);
    }

    /// Deposits `value`, in the signal's display form, as if driven by the
    /// design. Change callbacks fire before this returns.
    pub fn poke(&self, path: &str, value: &str) -> Result<(), ModelError> {
        let id = self.signal_at(path)?;
        self.write(id, SetAction::Deposit, |v| v.with_str(value))
            .map_err(|e| invalid(path, e.0))
    }

    /// Reads a signal in its display form.
    pub fn value_of(&self, path: &str) -> Result<String, ModelError> {
        let id = self.signal_at(path)?;
        let values = self.values.borrow();
        values
            .get(&id)
            .map(|s| s.value.text())
            .ok_or_else(|| ModelError::UnknownPath(path.to_string()))
    }

    /// Whether a signal is currently forced.
    pub fn is_forced(&self, path: &str) -> Result<bool, ModelError> {
        let id = self.signal_at(path)?;
        Ok(self.values.borrow().get(&id).is_some_and(|s| s.forced))
    }

    /// Delivers a trigger for `id` as if the simulator had fired it.
    pub fn inject_trigger(&self, id: CallbackId) {
        self.fire(id);
    }

    /// Lookups received so far, as `kind:target` strings.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }

    /// Forgets the recorded lookups.
    pub fn clear_lookups(&self) {
        self.lookups.borrow_mut().clear();
    }

    /// Number of native references released by dropped handles.
    pub fn released_count(&self) -> usize {
        self.released.get()
    }

    /// Whether the end of the simulation has been requested.
    pub fn end_requested(&self) -> bool {
        self.end_requested.get()
    }

    /// Number of live native registrations.
    pub fn registration_count(&self) -> usize {
        self.schedule.borrow().live_count()
    }

    /// Fully-qualified name of the top scope.
    pub fn top_name(&self) -> &str {
        &self.hierarchy.top().fullname
    }

    fn record(&self, kind: &str, target: &str) {
        self.lookups.borrow_mut().push(format!("{kind}:{target}"));
    }

    fn signal_at(&self, path: &str) -> Result<usize, ModelError> {
        self.hierarchy
            .find(path)
            .filter(|id| self.hierarchy.node(*id).signal.is_some())
            .ok_or_else(|| ModelError::UnknownPath(path.to_string()))
    }

    fn signal_of(&self, handle: &ObjectHandle) -> Result<usize, BackendError> {
        self.hierarchy
            .find_native(handle.native().0)
            .filter(|id| self.hierarchy.node(*id).signal.is_some())
            .ok_or_else(|| BackendError::new(format!("'{}' is not a model signal", handle.fullname())))
    }

    fn read<T>(
        &self,
        handle: &ObjectHandle,
        f: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Result<T, BackendError> {
        let id = self.signal_of(handle)?;
        let values = self.values.borrow();
        let state = values
            .get(&id)
            .ok_or_else(|| BackendError::new("signal has no value"))?;
        f(&state.value).map_err(BackendError)
    }

    /// Applies a write and, if the value changed, fires the change
    /// subscribers of the signal after the state borrow ends.
    fn write(
        &self,
        id: usize,
        action: SetAction,
        convert: impl FnOnce(&Value) -> Result<Value, String>,
    ) -> Result<(), BackendError> {
        let changed = {
            let mut values = self.values.borrow_mut();
            let state = values
                .get_mut(&id)
                .ok_or_else(|| BackendError::new("signal has no value"))?;
            let new = match action {
                SetAction::Release => state.value.clone(),
                _ => convert(&state.value).map_err(BackendError)?,
            };
            state.write(new, action).map_err(BackendError)?
        };
        if changed {
            let node = self.hierarchy.node(id);
            tracing::trace!(signal = %node.fullname, %action, "value changed");
            let waiting = self.schedule.borrow().waiting_on(Trigger::Change(id));
            for native in waiting {
                self.fire_native(native);
            }
        }
        Ok(())
    }

    fn write_handle(
        &self,
        handle: &ObjectHandle,
        action: SetAction,
        convert: impl FnOnce(&Value) -> Result<Value, String>,
    ) -> Result<(), BackendError> {
        let id = self.signal_of(handle)?;
        self.write(id, action, convert)
    }

    fn fire_phase(&self, phase: Phase) {
        let waiting = self.schedule.borrow().waiting_on(Trigger::Phase(phase));
        for native in waiting {
            self.fire_native(native);
        }
    }

    /// Fires a registration if it is still live when its turn comes; an
    /// earlier callback in the same batch may have removed it.
    fn fire_native(&self, native: u64) {
        let claimed = self.schedule.borrow_mut().claim(native);
        if let Some(id) = claimed {
            self.fire(id);
        }
    }

    fn fire(&self, id: CallbackId) {
        let reentry = self.reentry.borrow().clone();
        match reentry {
            Some(reentry) => reentry.fire(id),
            None => tracing::warn!(backend = %self.name, callback = %id, "trigger with no adapter attached"),
        }
    }

    fn register(&self, trigger: Trigger, id: CallbackId) -> NativeCallback {
        let native = self.schedule.borrow_mut().register(trigger, id);
        tracing::trace!(backend = %self.name, callback = %id, ?trigger, "registered");
        native
    }

    fn describe(&self, id: usize) -> NativeObject {
        self.hierarchy.node(id).describe()
    }

    fn child_steps(&self, parent: &ObjectHandle) -> Option<VecDeque<IterStep>> {
        if let Some(members) = self.hierarchy.family(parent.fullname()) {
            // Members listed under their pseudo-region are plain scopes.
            return Some(
                members
                    .iter()
                    .map(|id| {
                        let mut obj = self.describe(*id);
                        obj.generate = None;
                        IterStep::Native(obj)
                    })
                    .collect(),
            );
        }
        let id = self.hierarchy.find(parent.fullname())?;
        let steps = self
            .hierarchy
            .node(id)
            .children
            .iter()
            .map(|child| match child {
                Child::Node(id) => IterStep::Native(self.describe(*id)),
                Child::Foreign { name, raw: None } => IterStep::NotNative { name: name.clone() },
                Child::Foreign { raw: Some(raw), .. } => IterStep::NotNativeNoName {
                    raw: NativeRef(*raw),
                },
            })
            .collect();
        Some(steps)
    }
}

impl Backend for ModelBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, reentry: Reentry) {
        *self.reentry.borrow_mut() = Some(reentry);
    }

    fn sim_end(&self) {
        tracing::info!(backend = %self.name, time = self.now(), "end of simulation requested");
        self.end_requested.set(true);
    }

    fn sim_time(&self) -> SimTime {
        SimTime(self.now())
    }

    fn sim_precision(&self) -> i32 {
        self.precision
    }

    fn product(&self) -> String {
        self.product.clone()
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn root(&self, name: Option<&str>) -> Option<NativeObject> {
        let top = self.hierarchy.top();
        self.record("root", name.unwrap_or(""));
        match name {
            Some(name) if name != top.name => None,
            _ => Some(top.describe()),
        }
    }

    fn resolve_by_name(&self, parent: &ObjectHandle, name: &str) -> Option<NativeObject> {
        let path = format!("{}.{name}", parent.fullname());
        self.record("name", &path);
        self.hierarchy.find(&path).map(|id| self.describe(id))
    }

    fn resolve_by_index(&self, parent: &ObjectHandle, index: i32) -> Option<NativeObject> {
        let path = format!("{}({index})", parent.fullname());
        self.record("index", &path);
        self.hierarchy.find(&path).map(|id| self.describe(id))
    }

    fn resolve_from_raw(&self, raw: NativeRef, _parent: &ObjectHandle) -> Option<NativeObject> {
        self.record("raw", &format!("{:#x}", raw.0));
        self.hierarchy.find_native(raw.0).map(|id| self.describe(id))
    }

    fn generate_region(&self, parent: &ObjectHandle, label: &str) -> Option<String> {
        let path = format!("{}.{label}", parent.fullname());
        self.hierarchy.family(&path).map(|_| path)
    }

    fn iterate(
        &self,
        parent: &ObjectHandle,
        selector: IterSelector,
    ) -> Option<Box<dyn NativeIterator>> {
        self.record("iterate", parent.fullname());
        let steps = match selector {
            IterSelector::Objects => self.child_steps(parent)?,
            IterSelector::PackageScopes => self
                .hierarchy
                .packages()
                .iter()
                .map(|id| IterStep::Native(self.describe(*id)))
                .collect(),
            IterSelector::Drivers | IterSelector::Loads => return None,
        };
        Some(Box::new(StepIter { steps }))
    }

    fn register_timed(&self, delay: u64, id: CallbackId) -> Result<NativeCallback, BackendError> {
        let at = self.now().saturating_add(delay);
        Ok(self.register(Trigger::At(at), id))
    }

    fn register_readonly(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        Ok(self.register(Trigger::Phase(Phase::ReadOnly), id))
    }

    fn register_readwrite(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        Ok(self.register(Trigger::Phase(Phase::ReadWrite), id))
    }

    fn register_nexttime(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        Ok(self.register(Trigger::Phase(Phase::NextTime), id))
    }

    fn register_value_change(
        &self,
        signal: &ObjectHandle,
        id: CallbackId,
    ) -> Result<NativeCallback, BackendError> {
        let node = self.signal_of(signal)?;
        Ok(self.register(Trigger::Change(node), id))
    }

    fn register_startup(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        Ok(self.register(Trigger::Phase(Phase::Startup), id))
    }

    fn register_shutdown(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        Ok(self.register(Trigger::Phase(Phase::Shutdown), id))
    }

    fn deregister(&self, native: NativeCallback) -> Result<(), BackendError> {
        if self.schedule.borrow_mut().deregister(native) {
            Ok(())
        } else {
            Err(BackendError::new(format!("no registration {}", native.0)))
        }
    }

    fn reason_to_string(&self, reason: i32) -> String {
        match reason {
            0 => "timed".to_string(),
            1 => "read-write".to_string(),
            2 => "read-only".to_string(),
            3 => "next-time".to_string(),
            4 => "value-change".to_string(),
            5 => "startup".to_string(),
            6 => "shutdown".to_string(),
            other => format!("unknown reason {other}"),
        }
    }

    fn value_binstr(&self, signal: &ObjectHandle) -> Result<String, BackendError> {
        self.read(signal, Value::binstr)
    }

    fn value_str(&self, signal: &ObjectHandle) -> Result<String, BackendError> {
        self.read(signal, |v| Ok(v.text()))
    }

    fn value_real(&self, signal: &ObjectHandle) -> Result<f64, BackendError> {
        self.read(signal, Value::real)
    }

    fn value_long(&self, signal: &ObjectHandle) -> Result<i64, BackendError> {
        self.read(signal, Value::long)
    }

    fn set_value_binstr(
        &self,
        signal: &ObjectHandle,
        value: &str,
        action: SetAction,
    ) -> Result<(), BackendError> {
        self.write_handle(signal, action, |v| v.with_binstr(value))
    }

    fn set_value_str(
        &self,
        signal: &ObjectHandle,
        value: &str,
        action: SetAction,
    ) -> Result<(), BackendError> {
        self.write_handle(signal, action, |v| v.with_str(value))
    }

    fn set_value_real(
        &self,
        signal: &ObjectHandle,
        value: f64,
        action: SetAction,
    ) -> Result<(), BackendError> {
        self.write_handle(signal, action, |v| v.with_real(value))
    }

    fn set_value_long(
        &self,
        signal: &ObjectHandle,
        value: i64,
        action: SetAction,
    ) -> Result<(), BackendError> {
        self.write_handle(signal, action, |v| v.with_long(value))
    }

    fn release(&self, _native: NativeRef) {
        self.released.set(self.released.get() + 1);
    }
}
