//! Callback identities, kinds, and lifecycle states.
//!
//! Every pending notification is a record in the [`CallbackTable`], keyed by
//! [`CallbackId`]. The record tracks its [`CallbackState`]:
//!
//! ```text
//! FREE --arm--> PRIMED --trigger--> CALL --+--> PRIMED     (recurring)
//!                                          +--> destroyed  (one-shot)
//!                          remove in CALL: CALL --> DELETE --> destroyed
//! ```
//!
//! The transitions themselves are driven by the [`Gpi`](crate::Gpi) context;
//! this module only holds the data.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::backend::{BackendRef, NativeCallback};
use crate::context::Gpi;
use crate::handle::ObjectHandle;
use crate::value::Edge;

/// Identifier of a callback, also used as the token backends fire with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Creates an id from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb#{}", self.0)
    }
}

/// A user function invoked when a callback fires.
///
/// It receives the adapter context and may call any adapter operation,
/// including removing its own callback.
pub type CallbackFn = Box<dyn FnMut(&Gpi)>;

/// What a callback waits for.
#[derive(Clone, Debug)]
pub enum CallbackKind {
    /// A fixed delay in simulator ticks. One-shot.
    Timed {
        /// Delay in ticks.
        delay: u64,
    },
    /// The read-only phase at the end of each time step. Recurring.
    ReadOnly,
    /// The read-write phase of each time step. Recurring.
    ReadWrite,
    /// The start of each new time step. Recurring.
    NextTime,
    /// Value changes of a signal, filtered by edge. Recurring.
    ValueChange {
        /// The observed signal.
        signal: Rc<ObjectHandle>,
        /// Which changes invoke the user function.
        edge: Edge,
    },
    /// The `count`-th edge of a signal, via the edge scheduler. One-shot.
    EdgeCount {
        /// The observed signal.
        signal: Rc<ObjectHandle>,
        /// Edge class counted.
        edge: Edge,
        /// Number of edges to wait for.
        count: u32,
    },
    /// Simulation start. One-shot.
    Startup,
    /// Simulation shutdown. One-shot.
    Shutdown,
}

impl CallbackKind {
    /// Returns `true` for kinds that stay armed after firing.
    pub fn is_recurring(&self) -> bool {
        matches!(
            self,
            CallbackKind::ReadOnly
                | CallbackKind::ReadWrite
                | CallbackKind::NextTime
                | CallbackKind::ValueChange { .. }
        )
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            CallbackKind::Timed { .. } => "timed",
            CallbackKind::ReadOnly => "readonly",
            CallbackKind::ReadWrite => "readwrite",
            CallbackKind::NextTime => "nexttime",
            CallbackKind::ValueChange { .. } => "value-change",
            CallbackKind::EdgeCount { .. } => "edge",
            CallbackKind::Startup => "startup",
            CallbackKind::Shutdown => "shutdown",
        }
    }
}

/// Lifecycle state of a callback.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CallbackState {
    /// Not registered with any backend.
    Free,
    /// Registered, waiting for its trigger.
    Primed,
    /// The user function is running.
    Call,
    /// Removal was requested while running; destroyed when the run ends.
    Delete,
}

impl fmt::Display for CallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackState::Free => write!(f, "FREE"),
            CallbackState::Primed => write!(f, "PRIMED"),
            CallbackState::Call => write!(f, "CALL"),
            CallbackState::Delete => write!(f, "DELETE"),
        }
    }
}

/// One pending or active callback.
pub(crate) struct CallbackRecord {
    pub(crate) kind: CallbackKind,
    pub(crate) state: CallbackState,
    /// Taken out while the user function runs.
    pub(crate) func: Option<CallbackFn>,
    /// Backend registration while armed natively.
    pub(crate) native: Option<(BackendRef, NativeCallback)>,
}

/// All live callbacks.
#[derive(Default)]
pub(crate) struct CallbackTable {
    next_id: u64,
    records: HashMap<CallbackId, CallbackRecord>,
}

impl CallbackTable {
    /// Creates a `FREE` record and returns its id.
    pub(crate) fn insert(&mut self, kind: CallbackKind, func: CallbackFn) -> CallbackId {
        self.next_id += 1;
        let id = CallbackId(self.next_id);
        self.records.insert(
            id,
            CallbackRecord {
                kind,
                state: CallbackState::Free,
                func: Some(func),
                native: None,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: CallbackId) -> Option<&CallbackRecord> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: CallbackId) -> Option<&mut CallbackRecord> {
        self.records.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: CallbackId) -> Option<CallbackRecord> {
        self.records.remove(&id)
    }

    pub(crate) fn state(&self, id: CallbackId) -> Option<CallbackState> {
        self.records.get(&id).map(|r| r.state)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
