//! Error types for the GPI adapter.
//!
//! All failures surfaced by the [`Gpi`](crate::Gpi) context are variants of
//! [`GpiError`]. Each variant also carries the severity it should be reported
//! at, so that probing for optional objects stays quiet while malformed
//! requests and protocol violations stand out.

use tracing::Level;

use crate::callback::CallbackId;
use crate::config::ConfigError;

/// Result alias for fallible adapter operations.
pub type GpiResult<T> = Result<T, GpiError>;

/// Errors that can occur while resolving objects, accessing values, or
/// managing callbacks.
#[derive(Debug, thiserror::Error)]
pub enum GpiError {
    /// A backend with the same name has already been registered.
    #[error("backend '{0}' is already registered")]
    DuplicateBackend(String),

    /// An operation needed a backend but none is registered.
    #[error("no backend registered")]
    NoBackend,

    /// No registered backend produced a root object.
    #[error("no root handle found")]
    NoRootHandle {
        /// The requested root name, if one was given.
        name: Option<String>,
    },

    /// No backend could resolve a child by name.
    #[error("'{name}' not found under '{parent}'")]
    ChildNotFound {
        /// Fully-qualified name of the parent.
        parent: String,
        /// The requested child name.
        name: String,
    },

    /// The owning backend could not resolve a child by index.
    #[error("index {index} not found under '{parent}'")]
    IndexNotFound {
        /// Fully-qualified name of the parent.
        parent: String,
        /// The requested index.
        index: i32,
    },

    /// No backend could turn a raw native reference into an object.
    #[error("raw reference {raw:#x} not resolvable under '{parent}'")]
    RawNotFound {
        /// Fully-qualified name of the parent.
        parent: String,
        /// The raw native reference value.
        raw: u64,
    },

    /// `initialise` was called on a handle that already has names.
    #[error("handle '{0}' is already initialised")]
    AlreadyInitialised(String),

    /// A value operation was attempted on a non-signal object.
    #[error("'{0}' is not a signal")]
    NotASignal(String),

    /// A binary string does not match the element count of a vector signal.
    #[error("value of length {got} does not match the {expected} elements of '{name}'")]
    LengthMismatch {
        /// Fully-qualified name of the signal.
        name: String,
        /// Element count of the signal.
        expected: usize,
        /// Length of the supplied string.
        got: usize,
    },

    /// A binary string contains a character that is not a logic value.
    #[error("invalid logic character '{0}'")]
    InvalidLogic(char),

    /// An edge callback request is malformed.
    #[error("invalid edge request: {0}")]
    InvalidEdgeRequest(String),

    /// `arm` was called on a callback that is not `FREE`.
    #[error("callback {0} is already armed")]
    AlreadyArmed(CallbackId),

    /// The callback is not known to the adapter (already destroyed).
    #[error("unknown callback {0}")]
    UnknownCallback(CallbackId),

    /// A backend reported a failure.
    #[error("backend '{backend}' failed: {reason}")]
    Backend {
        /// Name of the failing backend.
        backend: String,
        /// Backend-provided description.
        reason: String,
    },

    /// A backend delivered a trigger that contradicts the callback table.
    #[error("corrupt callback dispatch: {0}")]
    CorruptDispatch(String),

    /// A host environment entry point failed.
    #[error("host environment failed: {0}")]
    Host(String),

    /// An extra library could not be loaded or entered.
    #[error("failed to load extra library '{library}': {reason}")]
    ExtraLoad {
        /// Path of the library.
        library: String,
        /// Loader-provided description.
        reason: String,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GpiError {
    /// Returns the severity this error is reported at.
    ///
    /// Lookups that miss are routine probes and stay at `DEBUG`; duplicate
    /// registration is a `WARN`; everything else is an `ERROR`.
    pub fn level(&self) -> Level {
        match self {
            GpiError::NoRootHandle { .. }
            | GpiError::ChildNotFound { .. }
            | GpiError::IndexNotFound { .. }
            | GpiError::RawNotFound { .. } => Level::DEBUG,
            GpiError::DuplicateBackend(_) => Level::WARN,
            _ => Level::ERROR,
        }
    }

    /// Returns `true` for lookup misses.
    pub fn is_not_found(&self) -> bool {
        self.level() == Level::DEBUG
    }

    /// Returns `true` if the error leaves callback dispatch in an undefined state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GpiError::CorruptDispatch(_))
    }

    /// Emits the error through `tracing` at its own severity.
    pub fn report(&self) {
        match self.level() {
            Level::DEBUG => tracing::debug!(error = %self, "lookup failed"),
            Level::WARN => tracing::warn!(error = %self, "request ignored"),
            _ if self.is_fatal() => tracing::error!(error = %self, "critical: dispatch corrupted"),
            _ => tracing::error!(error = %self, "request failed"),
        }
    }
}
