//! TOML description of a model design.
//!
//! Every object is declared by its dotted path. Parents must be declared (or
//! be the top), except that generate families create their members:
//!
//! ```toml
//! top = "top"
//! precision = "1ps"
//!
//! [[scopes]]
//! path = "top.cpu"
//! definition = "cpu"
//!
//! [[signals]]
//! path = "top.clk"
//!
//! [[signals]]
//! path = "top.data"
//! width = 8
//! range = [7, 0]
//! init = "00000000"
//!
//! [[generates]]
//! path = "top.lane"
//! count = 4
//!
//! [[packages]]
//! name = "pkg"
//!
//! [[foreign]]
//! path = "top.sv_mod"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ModelError;

/// A complete model design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// Name of the top-level scope.
    pub top: String,
    /// Time precision, as a unit string such as `1ps`.
    #[serde(default = "default_precision")]
    pub precision: String,
    /// Reported simulator product.
    #[serde(default = "default_product")]
    pub product: String,
    /// Reported simulator version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Hierarchical scopes below the top.
    #[serde(default)]
    pub scopes: Vec<ScopeSpec>,
    /// Value-carrying objects.
    #[serde(default)]
    pub signals: Vec<SignalSpec>,
    /// Generate loops.
    #[serde(default)]
    pub generates: Vec<GenerateSpec>,
    /// Package scopes.
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    /// Children that belong to another backend.
    #[serde(default)]
    pub foreign: Vec<ForeignSpec>,
}

fn default_precision() -> String {
    "1ps".to_string()
}

fn default_product() -> String {
    "aion-model".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_width() -> usize {
    1
}

/// A module or entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSpec {
    /// Dotted path.
    pub path: String,
    /// Definition (module type) name.
    #[serde(default)]
    pub definition: Option<String>,
    /// Definition source file.
    #[serde(default)]
    pub file: Option<String>,
    /// Fixed native reference, for raw lookups from other backends.
    #[serde(default)]
    pub raw: Option<u64>,
}

/// The value type of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Logic vector; one character per bit.
    #[default]
    Logic,
    /// Real number.
    Real,
    /// 32-bit integer.
    Integer,
    /// Character string.
    String,
}

/// A value-carrying object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Dotted path.
    pub path: String,
    /// Value type.
    #[serde(default, rename = "type")]
    pub ty: SignalType,
    /// Bit width of logic signals.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Index range `[left, right]`.
    #[serde(default)]
    pub range: Option<[i32; 2]>,
    /// Initial value, in the signal's own representation.
    #[serde(default)]
    pub init: Option<String>,
    /// Whether the object is a constant (parameter, generic).
    #[serde(default)]
    pub constant: bool,
    /// Fixed native reference.
    #[serde(default)]
    pub raw: Option<u64>,
}

/// A generate loop; creates members `path(0)` to `path(count - 1)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSpec {
    /// Dotted path of the family (the pseudo-region's name).
    pub path: String,
    /// Number of iterations.
    pub count: usize,
}

/// A package scope, reachable as a root-level scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name.
    pub name: String,
}

/// A child that this model lists but cannot materialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignSpec {
    /// Dotted path.
    pub path: String,
    /// When set, the child is reported by raw reference instead of by name.
    #[serde(default)]
    pub raw: Option<u64>,
}

impl Design {
    /// A design with only a top scope.
    pub fn new(top: impl Into<String>) -> Self {
        Self {
            top: top.into(),
            precision: default_precision(),
            product: default_product(),
            version: default_version(),
            scopes: Vec::new(),
            signals: Vec::new(),
            generates: Vec::new(),
            packages: Vec::new(),
            foreign: Vec::new(),
        }
    }

    /// Parses a design from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ModelError> {
        toml::from_str(content).map_err(|e| ModelError::Parse(e.to_string()))
    }

    /// Reads and parses a design file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Adds a scope.
    pub fn scope(mut self, path: impl Into<String>) -> Self {
        self.scopes.push(ScopeSpec {
            path: path.into(),
            definition: None,
            file: None,
            raw: None,
        });
        self
    }

    /// Adds a logic signal of the given width.
    pub fn logic(mut self, path: impl Into<String>, width: usize) -> Self {
        self.signals.push(SignalSpec {
            path: path.into(),
            ty: SignalType::Logic,
            width,
            range: None,
            init: None,
            constant: false,
            raw: None,
        });
        self
    }

    /// Adds a generate family.
    pub fn generate(mut self, path: impl Into<String>, count: usize) -> Self {
        self.generates.push(GenerateSpec {
            path: path.into(),
            count,
        });
        self
    }
}
