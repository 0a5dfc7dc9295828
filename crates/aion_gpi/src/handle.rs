//! Object handles: the adapter-side identity of simulation objects.
//!
//! A backend describes each object it finds as a [`NativeObject`]; the
//! [`Gpi`](crate::Gpi) context wraps it into an [`ObjectHandle`], initialises
//! its names exactly once, and passes it through the identity cache. Handles
//! for signals additionally expose value access, delegated to the owning
//! backend.

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::backend::Backend;
use crate::error::{GpiError, GpiResult};
use crate::value::{validate_binstr, SetAction};

/// Opaque backend-native reference (pointer or table index).
///
/// Only the backend that produced it can interpret it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NativeRef(pub u64);

/// The kind of a simulation object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Not classifiable by the backend.
    Unknown,
    /// A memory (array of registers).
    Memory,
    /// A module, entity, or other hierarchical scope.
    Module,
    /// A net (wire).
    Net,
    /// A parameter or generic.
    Parameter,
    /// A register (variable).
    Register,
    /// An unpacked array.
    Array,
    /// An enumeration-typed object.
    Enum,
    /// A structure or record.
    Structure,
    /// A real-valued object.
    Real,
    /// An integer-valued object.
    Integer,
    /// A string-valued object.
    String,
    /// A pseudo-region grouping the iterations of a generate loop.
    GenArray,
    /// A package scope.
    Package,
    /// A single-bit logic object.
    Logic,
    /// A vector of logic elements.
    LogicArray,
}

impl ObjectKind {
    /// Returns the type string reported to engines.
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Unknown => "GPI_UNKNOWN",
            ObjectKind::Memory => "GPI_MEMORY",
            ObjectKind::Module => "GPI_MODULE",
            ObjectKind::Net => "GPI_NET",
            ObjectKind::Parameter => "GPI_PARAMETER",
            ObjectKind::Register => "GPI_REGISTER",
            ObjectKind::Array => "GPI_ARRAY",
            ObjectKind::Enum => "GPI_ENUM",
            ObjectKind::Structure => "GPI_STRUCTURE",
            ObjectKind::Real => "GPI_REAL",
            ObjectKind::Integer => "GPI_INTEGER",
            ObjectKind::String => "GPI_STRING",
            ObjectKind::GenArray => "GPI_GENARRAY",
            ObjectKind::Package => "GPI_PACKAGE",
            ObjectKind::Logic => "GPI_LOGIC",
            ObjectKind::LogicArray => "GPI_LOGIC_ARRAY",
        }
    }

    /// Returns `true` for kinds whose values are binary strings with one
    /// character per element.
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            ObjectKind::Net | ObjectKind::Register | ObjectKind::Logic | ObjectKind::LogicArray
        )
    }

    /// Returns `true` for kinds that contain other objects by name.
    pub fn is_scope(self) -> bool {
        matches!(
            self,
            ObjectKind::Module | ObjectKind::GenArray | ObjectKind::Package
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an index range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum RangeDirection {
    /// No direction (single element or not indexable).
    #[default]
    None,
    /// Ascending (`to`, `[0:7]`).
    Up,
    /// Descending (`downto`, `[7:0]`).
    Down,
}

impl RangeDirection {
    /// Returns the numeric code used across the procedural boundary.
    pub fn as_raw(self) -> i32 {
        match self {
            RangeDirection::None => 0,
            RangeDirection::Up => 1,
            RangeDirection::Down => -1,
        }
    }
}

/// Index bounds of an indexable object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Range {
    /// Left bound.
    pub left: i32,
    /// Right bound.
    pub right: i32,
}

impl Range {
    /// Creates a range, deriving its direction from the bounds.
    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// Returns the direction implied by the bounds.
    pub fn direction(self) -> RangeDirection {
        match self.left.cmp(&self.right) {
            std::cmp::Ordering::Less => RangeDirection::Up,
            std::cmp::Ordering::Greater => RangeDirection::Down,
            std::cmp::Ordering::Equal => RangeDirection::None,
        }
    }

    /// Number of indices covered by the range.
    pub fn len(self) -> usize {
        (self.left - self.right).unsigned_abs() as usize + 1
    }

    /// Always `false`; a range covers at least one index.
    pub fn is_empty(self) -> bool {
        false
    }
}

/// Backend-reported properties of an object, fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object kind.
    pub kind: ObjectKind,
    /// Whether the object holds a value that can be read and written.
    pub signal: bool,
    /// Whether the value is constant (parameters, generics, constants).
    pub is_const: bool,
    /// Number of elements (bits for vectors, entries for arrays).
    pub num_elems: usize,
    /// Index range, if the object is indexable.
    pub range: Option<Range>,
    /// Name of the definition (module/entity type), if known.
    pub definition_name: Option<String>,
    /// Source file of the definition, if known.
    pub definition_file: Option<String>,
}

impl ObjectInfo {
    /// Info for a hierarchical scope of the given kind.
    pub fn scope(kind: ObjectKind) -> Self {
        Self {
            kind,
            signal: false,
            is_const: false,
            num_elems: 0,
            range: None,
            definition_name: None,
            definition_file: None,
        }
    }

    /// Info for a value-carrying object of the given kind and element count.
    pub fn signal(kind: ObjectKind, num_elems: usize) -> Self {
        Self {
            kind,
            signal: true,
            is_const: false,
            num_elems,
            range: None,
            definition_name: None,
            definition_file: None,
        }
    }

    /// Sets the index range.
    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Marks the object as constant.
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }
}

/// Marks an object as one iteration of a generate loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateMember {
    /// Common label shared by all iterations (e.g. `loop`).
    pub label: String,
    /// Fully-qualified name of the pseudo-region grouping the iterations.
    pub region_fullname: String,
}

/// A backend's description of an object it found.
#[derive(Clone, Debug)]
pub struct NativeObject {
    /// The backend-native reference.
    pub native: NativeRef,
    /// Short name.
    pub name: String,
    /// Fully-qualified name.
    pub fullname: String,
    /// Object properties.
    pub info: ObjectInfo,
    /// Set when the object is one iteration of a generate loop.
    pub generate: Option<GenerateMember>,
}

#[derive(Debug)]
struct Names {
    name: String,
    fullname: String,
}

/// Adapter-side handle for a simulation object.
///
/// Handles are shared as `Rc<ObjectHandle>`; after passing through the
/// identity cache, pointer equality implies fully-qualified-name equality.
/// Dropping the last reference releases the native reference through the
/// owning backend.
pub struct ObjectHandle {
    backend: Rc<dyn Backend>,
    native: NativeRef,
    owns_native: bool,
    info: ObjectInfo,
    names: OnceCell<Names>,
}

impl ObjectHandle {
    /// Wraps a native reference owned by `backend`.
    pub fn new(backend: Rc<dyn Backend>, native: NativeRef, info: ObjectInfo) -> Self {
        Self {
            backend,
            native,
            owns_native: true,
            info,
            names: OnceCell::new(),
        }
    }

    /// Wraps a native reference that belongs to another handle and must not
    /// be released by this one.
    pub(crate) fn borrowing(backend: Rc<dyn Backend>, native: NativeRef, info: ObjectInfo) -> Self {
        Self {
            backend,
            native,
            owns_native: false,
            info,
            names: OnceCell::new(),
        }
    }

    /// Sets the short and fully-qualified names.
    ///
    /// Must be called exactly once; later calls are rejected and leave the
    /// names unchanged.
    pub fn initialise(&self, name: impl Into<String>, fullname: impl Into<String>) -> GpiResult<()> {
        let names = Names {
            name: name.into(),
            fullname: fullname.into(),
        };
        self.names
            .set(names)
            .map_err(|_| GpiError::AlreadyInitialised(self.fullname().to_string()))
    }

    /// Returns `true` once names have been set.
    pub fn is_initialised(&self) -> bool {
        self.names.get().is_some()
    }

    /// Short name (empty before initialisation).
    pub fn name(&self) -> &str {
        self.names.get().map_or("", |n| n.name.as_str())
    }

    /// Fully-qualified name (empty before initialisation).
    pub fn fullname(&self) -> &str {
        self.names.get().map_or("", |n| n.fullname.as_str())
    }

    /// Object kind.
    pub fn kind(&self) -> ObjectKind {
        self.info.kind
    }

    /// All backend-reported properties.
    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    /// Whether the object is constant.
    pub fn is_const(&self) -> bool {
        self.info.is_const
    }

    /// Whether the object carries a readable/writable value.
    pub fn is_signal(&self) -> bool {
        self.info.signal
    }

    /// Element count.
    pub fn num_elems(&self) -> usize {
        self.info.num_elems
    }

    /// Whether the object can be indexed.
    pub fn is_indexable(&self) -> bool {
        self.info.range.is_some()
    }

    /// Left index bound, if indexable.
    pub fn range_left(&self) -> Option<i32> {
        self.info.range.map(|r| r.left)
    }

    /// Right index bound, if indexable.
    pub fn range_right(&self) -> Option<i32> {
        self.info.range.map(|r| r.right)
    }

    /// Direction of the index range.
    pub fn range_dir(&self) -> RangeDirection {
        self.info.range.map_or(RangeDirection::None, Range::direction)
    }

    /// Definition name, if the backend knows it.
    pub fn definition_name(&self) -> Option<&str> {
        self.info.definition_name.as_deref()
    }

    /// Definition file, if the backend knows it.
    pub fn definition_file(&self) -> Option<&str> {
        self.info.definition_file.as_deref()
    }

    /// The backend-native reference.
    pub fn native(&self) -> NativeRef {
        self.native
    }

    /// The owning backend.
    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    /// Name of the owning backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn require_signal(&self) -> GpiResult<()> {
        if self.info.signal {
            Ok(())
        } else {
            Err(GpiError::NotASignal(self.fullname().to_string()))
        }
    }

    fn backend_error(&self, err: crate::backend::BackendError) -> GpiError {
        GpiError::Backend {
            backend: self.backend.name().to_string(),
            reason: err.to_string(),
        }
    }

    /// Reads the value as a binary string, most significant element first.
    pub fn value_binstr(&self) -> GpiResult<String> {
        self.require_signal()?;
        self.backend
            .value_binstr(self)
            .map_err(|e| self.backend_error(e))
    }

    /// Reads the value as a character string.
    pub fn value_str(&self) -> GpiResult<String> {
        self.require_signal()?;
        self.backend.value_str(self).map_err(|e| self.backend_error(e))
    }

    /// Reads the value as a real number.
    pub fn value_real(&self) -> GpiResult<f64> {
        self.require_signal()?;
        self.backend.value_real(self).map_err(|e| self.backend_error(e))
    }

    /// Reads the value as an integer.
    pub fn value_long(&self) -> GpiResult<i64> {
        self.require_signal()?;
        self.backend.value_long(self).map_err(|e| self.backend_error(e))
    }

    /// Writes a binary-string value.
    ///
    /// For vector kinds the string must have exactly [`num_elems`](Self::num_elems)
    /// characters; every character must be a logic value. On failure nothing
    /// is written.
    pub fn set_value_binstr(&self, value: &str, action: SetAction) -> GpiResult<()> {
        self.require_signal()?;
        validate_binstr(value)?;
        let got = value.chars().count();
        if self.info.kind.is_vector() && got != self.info.num_elems {
            return Err(GpiError::LengthMismatch {
                name: self.fullname().to_string(),
                expected: self.info.num_elems,
                got,
            });
        }
        tracing::trace!(signal = self.fullname(), value, %action, "set binstr");
        self.backend
            .set_value_binstr(self, value, action)
            .map_err(|e| self.backend_error(e))
    }

    /// Writes a string value.
    pub fn set_value_str(&self, value: &str, action: SetAction) -> GpiResult<()> {
        self.require_signal()?;
        self.backend
            .set_value_str(self, value, action)
            .map_err(|e| self.backend_error(e))
    }

    /// Writes a real value.
    pub fn set_value_real(&self, value: f64, action: SetAction) -> GpiResult<()> {
        self.require_signal()?;
        self.backend
            .set_value_real(self, value, action)
            .map_err(|e| self.backend_error(e))
    }

    /// Writes an integer value.
    pub fn set_value_long(&self, value: i64, action: SetAction) -> GpiResult<()> {
        self.require_signal()?;
        tracing::trace!(signal = self.fullname(), value, %action, "set long");
        self.backend
            .set_value_long(self, value, action)
            .map_err(|e| self.backend_error(e))
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("fullname", &self.fullname())
            .field("kind", &self.info.kind)
            .field("backend", &self.backend.name())
            .field("native", &self.native)
            .finish()
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if self.owns_native {
            self.backend.release(self.native);
        }
    }
}
