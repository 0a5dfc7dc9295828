//! Generic procedural interface (GPI) adapter for HDL simulators.
//!
//! This crate lets a verification engine walk a simulated design, read and
//! drive signals, and wait on simulation events without knowing which native
//! simulator interface sits underneath. Each native interface is wrapped by a
//! [`Backend`]; any number of backends can be registered with a [`Gpi`]
//! context, which resolves objects across all of them and owns the callback
//! machinery.
//!
//! # Architecture
//!
//! Resolved objects are [`ObjectHandle`]s deduplicated by fully-qualified name
//! through a [`HandleCache`], so two handles for the same name are always the
//! same `Rc`. Callbacks are identified by [`CallbackId`] and move through the
//! [`CallbackState`] machine; native triggers re-enter the adapter through
//! [`Reentry::fire`] and are serialized through a FIFO so nested triggers never
//! recurse. Edge callbacks ("wake me after N rising edges") are multiplexed
//! onto a single value-change subscription per signal.
//!
//! # Usage
//!
//! ```ignore
//! use aion_gpi::{Edge, Gpi};
//!
//! let gpi = Gpi::new();
//! gpi.register_backend(backend)?;
//! let top = gpi.root_handle(None)?;
//! let clk = gpi.child_by_name(&top, "clk")?;
//! gpi.register_edge_callback(&clk, Edge::Rising, 1, |gpi| {
//!     println!("rising edge at {}", gpi.sim_time().unwrap());
//! });
//! ```
//!
//! # Modules
//!
//! - `error`: Adapter error types and their report severity
//! - `value`: Logic characters, edges, and set actions
//! - `time`: Simulation time words and precision
//! - `handle`: Object handles and native object descriptions
//! - `backend`: The backend contract and the re-entry point
//! - `cache`: Handle-identity cache
//! - `registry`: Ordered backend list and cross-backend resolution
//! - `iterator`: Lazy hierarchy iteration
//! - `callback`: Callback kinds, states, and the callback table
//! - `dispatch`: Re-entrancy-safe trigger queue
//! - `edge`: Edge-count scheduler
//! - `context`: The [`Gpi`] context tying everything together
//! - `host`: Host environment boundary
//! - `config`: Environment and TOML configuration
//! - `extra`: Loading of extra shared libraries
//! - `logging`: `tracing` subscriber setup

#![warn(missing_docs)]

pub mod backend;
pub mod cache;
pub mod callback;
pub mod config;
pub mod context;
mod dispatch;
mod edge;
pub mod error;
pub mod extra;
pub mod handle;
pub mod host;
pub mod iterator;
pub mod logging;
pub mod registry;
pub mod time;
pub mod value;

#[cfg(test)]
pub(crate) mod stub;

pub use backend::{
    Backend, BackendError, IterSelector, IterStep, NativeCallback, NativeIterator, Reentry,
};
pub use cache::HandleCache;
pub use callback::{CallbackFn, CallbackId, CallbackKind, CallbackState};
pub use config::{
    load_config, load_config_from_str, parse_extra_list, ConfigError, ExtraEntry, GpiConfig,
};
pub use context::{Gpi, PREMATURE_SHUTDOWN};
pub use error::{GpiError, GpiResult};
pub use extra::{gpi_from_entry_arg, EntryPoint};
pub use handle::{
    GenerateMember, NativeObject, NativeRef, ObjectHandle, ObjectInfo, ObjectKind, Range,
    RangeDirection,
};
pub use host::{EventLevel, HostEnvironment, HostError};
pub use iterator::GpiIterator;
pub use logging::init_logging;
pub use registry::BackendRegistry;
pub use time::SimTime;
pub use value::{Edge, Logic, SetAction};
