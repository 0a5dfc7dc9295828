//! In-memory reference backend for the Aion GPI adapter.
//!
//! [`ModelBackend`] implements [`aion_gpi::Backend`] over a static hierarchy
//! described in TOML (see [`design`]). It keeps signal values, honours
//! force/release, runs a small event-driven scheduler, and records every
//! lookup the adapter sends it. It stands in for a real simulator in tests,
//! in the `aion-gpi` command-line tool, and anywhere the adapter needs a
//! deterministic backend.
//!
//! ```no_run
//! use aion_gpi::Gpi;
//! use aion_gpi_model::ModelBackend;
//!
//! let model = ModelBackend::from_toml_str("model", "top = \"top\"\n").unwrap();
//! let gpi = Gpi::new();
//! gpi.register_backend(model.clone()).unwrap();
//! let top = gpi.root_handle(None).unwrap();
//! assert_eq!(top.fullname(), "top");
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod design;
pub mod error;
mod hierarchy;
mod schedule;
mod signal;

pub use backend::ModelBackend;
pub use design::{Design, ForeignSpec, GenerateSpec, PackageSpec, ScopeSpec, SignalSpec, SignalType};
pub use error::ModelError;
