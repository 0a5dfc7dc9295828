//! Conformance test helpers for the Aion GPI adapter.
//!
//! Every suite under `tests/` runs the real [`Gpi`] context against one or
//! two [`ModelBackend`]s. The helpers here build those setups, record the
//! order in which callbacks and host entry points run, and drive clocks from
//! inside the simulation the way an engine would.

#![warn(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use aion_gpi::{EventLevel, Gpi, HostEnvironment, HostError, ObjectHandle, SetAction};
use aion_gpi_model::ModelBackend;

/// A design with a clock, a data bus, and a nested scope.
pub const CLOCKED: &str = r#"
top = "tb"
precision = "1ns"

[[scopes]]
path = "tb.dut"
definition = "counter"

[[signals]]
path = "tb.clk"
init = "0"

[[signals]]
path = "tb.dut.count"
width = 4
range = [3, 0]
init = "0000"

[[signals]]
path = "tb.dut.enable"
init = "1"
"#;

/// The primary half of a two-backend design. `tb.vhdl_blk` and the raw
/// reference `0x500` belong to [`MIXED_SECONDARY`].
pub const MIXED_PRIMARY: &str = r#"
top = "tb"
product = "primary-sim"

[[scopes]]
path = "tb.sv_core"

[[signals]]
path = "tb.clk"
init = "0"

[[generates]]
path = "tb.lane"
count = 3

[[foreign]]
path = "tb.vhdl_blk"

[[foreign]]
path = "tb.anon"
raw = 1280
"#;

/// The secondary half of a two-backend design.
pub const MIXED_SECONDARY: &str = r#"
top = "tb"
product = "secondary-sim"

[[scopes]]
path = "tb.vhdl_blk"

[[scopes]]
path = "tb.anon_blk"
raw = 1280

[[signals]]
path = "tb.vhdl_blk.ready"
init = "0"

[[scopes]]
path = "tb.lane(5)"
"#;

/// Name of the primary model backend.
pub const PRIMARY: &str = "primary";

/// Name of the secondary model backend.
pub const SECONDARY: &str = "secondary";

/// An ordered, shareable log of what happened.
#[derive(Clone, Default, Debug)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// All entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Number of entries equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.entries.borrow().iter().filter(|e| *e == entry).count()
    }

    /// A callback function that logs `label` each time it runs.
    pub fn recorder(&self, label: &str) -> impl FnMut(&Gpi) + 'static {
        let log = self.clone();
        let label = label.to_string();
        move |_| log.push(label.clone())
    }
}

/// An adapter context over one or two model backends.
pub struct Harness {
    /// The adapter context.
    pub gpi: Gpi,
    /// The first registered (primary) backend.
    pub primary: Rc<ModelBackend>,
    /// The second backend, if any.
    pub secondary: Option<Rc<ModelBackend>>,
}

impl Harness {
    /// A context with a single model backend built from `design`.
    pub fn new(design: &str) -> Self {
        let primary = ModelBackend::from_toml_str(PRIMARY, design).expect("primary design");
        let gpi = Gpi::new();
        gpi.register_backend(primary.clone())
            .expect("register primary");
        Self {
            gpi,
            primary,
            secondary: None,
        }
    }

    /// The two-backend setup of [`MIXED_PRIMARY`] and [`MIXED_SECONDARY`].
    pub fn mixed() -> Self {
        Self::new(MIXED_PRIMARY).with_secondary(MIXED_SECONDARY)
    }

    /// Registers a second model backend built from `design`.
    pub fn with_secondary(mut self, design: &str) -> Self {
        let secondary = ModelBackend::from_toml_str(SECONDARY, design).expect("secondary design");
        self.gpi
            .register_backend(secondary.clone())
            .expect("register secondary");
        self.secondary = Some(secondary);
        self
    }

    /// The secondary backend; panics if there is none.
    pub fn secondary(&self) -> &Rc<ModelBackend> {
        self.secondary.as_ref().expect("no secondary backend")
    }

    /// The root handle.
    pub fn top(&self) -> Rc<ObjectHandle> {
        self.gpi.root_handle(None).expect("root handle")
    }

    /// Resolves a dotted path below the root by names only.
    pub fn handle(&self, path: &str) -> Rc<ObjectHandle> {
        let mut names = path.split('.');
        let mut handle = self
            .gpi
            .root_handle(names.next())
            .expect("root handle");
        for name in names {
            handle = self
                .gpi
                .child_by_name(&handle, name)
                .unwrap_or_else(|e| panic!("resolving '{path}': {e}"));
        }
        handle
    }
}

/// Drives `clock` from inside the simulation: a timed callback flips it
/// every `half_period` ticks, `toggles` times in total.
pub fn drive_clock(gpi: &Gpi, clock: &Rc<ObjectHandle>, half_period: u64, toggles: u32) {
    if toggles == 0 {
        return;
    }
    let clock = Rc::clone(clock);
    gpi.register_timed_callback(half_period, move |gpi| {
        let next = match clock.value_binstr().as_deref() {
            Ok("1") => "0",
            _ => "1",
        };
        if let Err(err) = clock.set_value_binstr(next, SetAction::Deposit) {
            tracing::error!(error = %err, "clock write failed");
        }
        drive_clock(gpi, &clock, half_period, toggles - 1);
    });
}

/// A host environment whose engine is a closure run at initialisation.
pub struct ScriptedHost {
    log: EventLog,
    script: RefCell<Option<Box<dyn FnOnce(&Gpi)>>>,
    refuse: bool,
}

impl ScriptedHost {
    /// A host that logs its entry points to `log` and runs no script.
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            script: RefCell::new(None),
            refuse: false,
        }
    }

    /// Runs `script` when the host is initialised.
    pub fn with_script(self, script: impl FnOnce(&Gpi) + 'static) -> Self {
        *self.script.borrow_mut() = Some(Box::new(script));
        self
    }

    /// Makes initialisation fail.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Wraps the host for [`Gpi::bootstrap`].
    pub fn into_rc(self) -> Rc<dyn HostEnvironment> {
        Rc::new(self)
    }
}

impl HostEnvironment for ScriptedHost {
    fn init(&self, gpi: &Gpi, args: &[String]) -> Result<(), HostError> {
        self.log.push(format!("host:init {}", args.join(" ")));
        if self.refuse {
            return Err(HostError::Init("engine refused to start".into()));
        }
        let script = self.script.borrow_mut().take();
        if let Some(script) = script {
            script(gpi);
        }
        Ok(())
    }

    fn end(&self) {
        self.log.push("host:end");
    }

    fn event(&self, level: EventLevel, message: &str) {
        self.log.push(format!("host:event {level} {message}"));
    }
}
