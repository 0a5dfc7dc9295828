//! Test-only backend recording every call it receives.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{
    Backend, BackendError, IterSelector, IterStep, NativeCallback, NativeIterator, Reentry,
};
use crate::callback::CallbackId;
use crate::context::Gpi;
use crate::handle::{GenerateMember, NativeObject, NativeRef, ObjectHandle, ObjectInfo, ObjectKind};
use crate::host::{EventLevel, HostEnvironment, HostError};
use crate::time::SimTime;
use crate::value::SetAction;

pub(crate) struct StubBackend {
    name: String,
    objects: RefCell<HashMap<String, NativeObject>>,
    roots: RefCell<Vec<String>>,
    iterations: RefCell<HashMap<String, Vec<IterStep>>>,
    regions: RefCell<HashMap<String, String>>,
    queries: RefCell<Vec<String>>,
    released: RefCell<Vec<NativeRef>>,
    writes: RefCell<Vec<String>>,
    values: RefCell<HashMap<String, String>>,
    registrations: RefCell<Vec<(NativeCallback, CallbackId, String)>>,
    deregistered: RefCell<Vec<NativeCallback>>,
    next_native: Cell<u64>,
    reentry: RefCell<Option<Reentry>>,
    fail_register: Cell<bool>,
    ended: Cell<bool>,
}

impl StubBackend {
    pub(crate) fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            objects: RefCell::new(HashMap::new()),
            roots: RefCell::new(Vec::new()),
            iterations: RefCell::new(HashMap::new()),
            regions: RefCell::new(HashMap::new()),
            queries: RefCell::new(Vec::new()),
            released: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            values: RefCell::new(HashMap::new()),
            registrations: RefCell::new(Vec::new()),
            deregistered: RefCell::new(Vec::new()),
            next_native: Cell::new(100),
            reentry: RefCell::new(None),
            fail_register: Cell::new(false),
            ended: Cell::new(false),
        })
    }

    fn next(&self) -> u64 {
        let n = self.next_native.get();
        self.next_native.set(n + 1);
        n
    }

    fn insert(&self, fullname: String, name: &str, info: ObjectInfo) -> NativeObject {
        let obj = NativeObject {
            native: NativeRef(self.next()),
            name: name.to_string(),
            fullname: fullname.clone(),
            info,
            generate: None,
        };
        self.objects.borrow_mut().insert(fullname, obj.clone());
        obj
    }

    pub(crate) fn add_root(&self, name: &str) {
        self.insert(name.to_string(), name, ObjectInfo::scope(ObjectKind::Module));
        self.roots.borrow_mut().push(name.to_string());
    }

    pub(crate) fn add_child(&self, parent: &str, name: &str) -> NativeObject {
        self.insert(
            format!("{parent}.{name}"),
            name,
            ObjectInfo::scope(ObjectKind::Module),
        )
    }

    pub(crate) fn add_signal(&self, parent: &str, name: &str, width: usize) -> NativeObject {
        let kind = if width == 1 {
            ObjectKind::Logic
        } else {
            ObjectKind::LogicArray
        };
        let fullname = format!("{parent}.{name}");
        self.values
            .borrow_mut()
            .insert(fullname.clone(), "0".repeat(width));
        self.insert(fullname, name, ObjectInfo::signal(kind, width))
    }

    pub(crate) fn add_generate(&self, parent: &str, label: &str, count: usize) -> Vec<NativeObject> {
        let region = format!("{parent}.{label}");
        self.regions
            .borrow_mut()
            .insert(format!("{parent}/{label}"), region.clone());
        (0..count)
            .map(|i| {
                let mut obj = self.add_child(parent, &format!("{label}({i})"));
                obj.generate = Some(GenerateMember {
                    label: label.to_string(),
                    region_fullname: region.clone(),
                });
                obj
            })
            .collect()
    }

    pub(crate) fn set_iteration(&self, parent: &str, steps: Vec<IterStep>) {
        self.iterations
            .borrow_mut()
            .insert(parent.to_string(), steps);
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }

    pub(crate) fn released(&self) -> Vec<NativeRef> {
        self.released.borrow().clone()
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.writes.borrow().clone()
    }

    pub(crate) fn registrations(&self) -> Vec<(NativeCallback, CallbackId, String)> {
        self.registrations.borrow().clone()
    }

    pub(crate) fn deregistered(&self) -> Vec<NativeCallback> {
        self.deregistered.borrow().clone()
    }

    pub(crate) fn fail_registrations(&self, fail: bool) {
        self.fail_register.set(fail);
    }

    pub(crate) fn ended(&self) -> bool {
        self.ended.get()
    }

    /// Fires a callback id through the re-entry point, as a native trigger would.
    pub(crate) fn trigger(&self, id: CallbackId) {
        let reentry = self.reentry.borrow().clone();
        if let Some(reentry) = reentry {
            reentry.fire(id);
        }
    }

    /// Fires every live registration of the given kind.
    pub(crate) fn trigger_kind(&self, kind: &str) {
        let ids: Vec<CallbackId> = self
            .registrations
            .borrow()
            .iter()
            .filter(|(_, _, k)| k == kind)
            .map(|(_, id, _)| *id)
            .collect();
        for id in ids {
            self.trigger(id);
        }
    }

    /// Sets a value as the simulator would and notifies subscribers.
    pub(crate) fn drive(&self, fullname: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(fullname.to_string(), value.to_string());
        self.trigger_kind(&format!("change:{fullname}"));
    }

    fn register(&self, id: CallbackId, kind: String) -> Result<NativeCallback, BackendError> {
        if self.fail_register.get() {
            return Err(BackendError::new("registration refused"));
        }
        let native = NativeCallback(self.next());
        self.registrations.borrow_mut().push((native, id, kind));
        Ok(native)
    }

    fn lookup(&self, fullname: &str) -> Option<NativeObject> {
        self.objects.borrow().get(fullname).cloned()
    }
}

struct StubIter(std::vec::IntoIter<IterStep>);

impl NativeIterator for StubIter {
    fn next_step(&mut self) -> IterStep {
        self.0.next().unwrap_or(IterStep::End)
    }
}

impl Backend for StubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, reentry: Reentry) {
        *self.reentry.borrow_mut() = Some(reentry);
    }

    fn sim_end(&self) {
        self.ended.set(true);
    }

    fn sim_time(&self) -> SimTime {
        SimTime(0x1_0000_0005)
    }

    fn sim_precision(&self) -> i32 {
        -12
    }

    fn product(&self) -> String {
        format!("{} product", self.name)
    }

    fn version(&self) -> String {
        "1.0".to_string()
    }

    fn root(&self, name: Option<&str>) -> Option<NativeObject> {
        self.queries
            .borrow_mut()
            .push(format!("root:{}", name.unwrap_or("*")));
        let roots = self.roots.borrow();
        let found = match name {
            Some(n) => roots.iter().find(|r| r.as_str() == n),
            None => roots.first(),
        }?;
        self.lookup(found)
    }

    fn resolve_by_name(&self, parent: &ObjectHandle, name: &str) -> Option<NativeObject> {
        self.queries.borrow_mut().push(format!("name:{name}"));
        self.lookup(&format!("{}.{name}", parent.fullname()))
    }

    fn resolve_by_index(&self, parent: &ObjectHandle, index: i32) -> Option<NativeObject> {
        self.queries.borrow_mut().push(format!("index:{index}"));
        self.lookup(&format!("{}({index})", parent.fullname()))
    }

    fn resolve_from_raw(&self, raw: NativeRef, _parent: &ObjectHandle) -> Option<NativeObject> {
        self.queries.borrow_mut().push(format!("raw:{}", raw.0));
        self.objects
            .borrow()
            .values()
            .find(|o| o.native == raw)
            .cloned()
    }

    fn generate_region(&self, parent: &ObjectHandle, label: &str) -> Option<String> {
        self.regions
            .borrow()
            .get(&format!("{}/{label}", parent.fullname()))
            .cloned()
    }

    fn iterate(&self, parent: &ObjectHandle, _selector: IterSelector) -> Option<Box<dyn NativeIterator>> {
        let steps = self.iterations.borrow_mut().remove(parent.fullname())?;
        Some(Box::new(StubIter(steps.into_iter())))
    }

    fn register_timed(&self, delay: u64, id: CallbackId) -> Result<NativeCallback, BackendError> {
        self.register(id, format!("timed:{delay}"))
    }

    fn register_readonly(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        self.register(id, "readonly".to_string())
    }

    fn register_readwrite(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        self.register(id, "readwrite".to_string())
    }

    fn register_nexttime(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        self.register(id, "nexttime".to_string())
    }

    fn register_value_change(
        &self,
        signal: &ObjectHandle,
        id: CallbackId,
    ) -> Result<NativeCallback, BackendError> {
        self.register(id, format!("change:{}", signal.fullname()))
    }

    fn register_startup(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        self.register(id, "startup".to_string())
    }

    fn register_shutdown(&self, id: CallbackId) -> Result<NativeCallback, BackendError> {
        self.register(id, "shutdown".to_string())
    }

    fn deregister(&self, native: NativeCallback) -> Result<(), BackendError> {
        self.registrations.borrow_mut().retain(|(n, _, _)| *n != native);
        self.deregistered.borrow_mut().push(native);
        Ok(())
    }

    fn value_binstr(&self, signal: &ObjectHandle) -> Result<String, BackendError> {
        self.values
            .borrow()
            .get(signal.fullname())
            .cloned()
            .ok_or_else(|| BackendError::new("no value"))
    }

    fn value_str(&self, signal: &ObjectHandle) -> Result<String, BackendError> {
        self.value_binstr(signal)
    }

    fn value_real(&self, _signal: &ObjectHandle) -> Result<f64, BackendError> {
        Err(BackendError::new("not real"))
    }

    fn value_long(&self, signal: &ObjectHandle) -> Result<i64, BackendError> {
        let bits = self.value_binstr(signal)?;
        i64::from_str_radix(&bits, 2).map_err(|e| BackendError::new(e.to_string()))
    }

    fn set_value_binstr(
        &self,
        signal: &ObjectHandle,
        value: &str,
        _action: SetAction,
    ) -> Result<(), BackendError> {
        self.writes
            .borrow_mut()
            .push(format!("{}={value}", signal.fullname()));
        self.drive(signal.fullname(), value);
        Ok(())
    }

    fn set_value_str(
        &self,
        signal: &ObjectHandle,
        value: &str,
        action: SetAction,
    ) -> Result<(), BackendError> {
        self.set_value_binstr(signal, value, action)
    }

    fn set_value_real(
        &self,
        _signal: &ObjectHandle,
        _value: f64,
        _action: SetAction,
    ) -> Result<(), BackendError> {
        Err(BackendError::new("not real"))
    }

    fn set_value_long(
        &self,
        signal: &ObjectHandle,
        value: i64,
        action: SetAction,
    ) -> Result<(), BackendError> {
        let width = signal.num_elems().max(1);
        let bits = format!("{value:0width$b}");
        self.set_value_binstr(signal, &bits[bits.len() - width..], action)
    }

    fn release(&self, native: NativeRef) {
        self.released.borrow_mut().push(native);
    }
}

/// Host recording every call as a log line.
#[derive(Default)]
pub(crate) struct RecordingHost {
    log: RefCell<Vec<String>>,
    fail_init: Cell<bool>,
}

impl RecordingHost {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub(crate) fn fail_init(&self, fail: bool) {
        self.fail_init.set(fail);
    }
}

impl HostEnvironment for RecordingHost {
    fn init(&self, _gpi: &Gpi, args: &[String]) -> Result<(), HostError> {
        self.log.borrow_mut().push(format!("init:{}", args.join(" ")));
        if self.fail_init.get() {
            return Err(HostError::Init("refused".into()));
        }
        Ok(())
    }

    fn end(&self) {
        self.log.borrow_mut().push("end".to_string());
    }

    fn event(&self, level: EventLevel, message: &str) {
        self.log.borrow_mut().push(format!("event:{level}:{message}"));
    }
}
